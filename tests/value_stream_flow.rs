use chrono::{TimeZone, Utc};
use serde_json::Value;

use vsmap::{
    Formatters, MaterialDependency, MaterialRevision, Modification, NodeId, PipelineDependency,
    PipelineRevision, StageStatus, StageSummary, ValueStreamGraph,
};

fn pipeline(name: &str) -> PipelineDependency {
    PipelineDependency::named(name)
}

/// The release train around the "acceptance" pipeline:
///
/// ```text
/// git-trunk  git-plugins-->plugins ---->acceptance---->deploy-go03---> publish --->deploy-go01
///         \             /                 ^ ^   \                                    ^
///          \           /                  | |    \                                  /
///           \         /                   | |     \                                /
/// hg-trunk--->cruise +--------------------+ |      +-->deploy-go02---------------+
///   +                                       |
///   +---------------------------------------+
/// ```
fn release_train() -> ValueStreamGraph {
    let mut graph = ValueStreamGraph::for_pipeline("acceptance");
    let acceptance = NodeId::from("acceptance");

    graph
        .add_upstream_pipeline(pipeline("plugins"), None, &acceptance)
        .unwrap();
    graph
        .add_upstream_pipeline(pipeline("git-plugins"), None, &NodeId::from("plugins"))
        .unwrap();
    graph
        .add_upstream_pipeline(pipeline("cruise"), None, &NodeId::from("plugins"))
        .unwrap();
    graph
        .add_upstream_material(
            MaterialDependency::new("git-trunk", "git-trunk", "git"),
            None,
            &NodeId::from("cruise"),
            MaterialRevision::default(),
        )
        .unwrap();
    graph
        .add_upstream_material(
            MaterialDependency::new("hg-trunk", "hg-trunk", "hg"),
            None,
            &NodeId::from("cruise"),
            MaterialRevision::default(),
        )
        .unwrap();
    graph
        .add_upstream_pipeline(pipeline("cruise"), None, &acceptance)
        .unwrap();
    graph
        .add_upstream_material(
            MaterialDependency::new("hg-trunk", "hg-trunk", "hg"),
            None,
            &acceptance,
            MaterialRevision::default(),
        )
        .unwrap();

    graph
        .add_downstream_pipeline(pipeline("deploy-go03"), &acceptance)
        .unwrap();
    graph
        .add_downstream_pipeline(pipeline("publish"), &NodeId::from("deploy-go03"))
        .unwrap();
    graph
        .add_downstream_pipeline(pipeline("deploy-go01"), &NodeId::from("publish"))
        .unwrap();
    graph
        .add_downstream_pipeline(pipeline("deploy-go02"), &acceptance)
        .unwrap();
    graph
        .add_downstream_pipeline(pipeline("deploy-go01"), &NodeId::from("deploy-go02"))
        .unwrap();

    graph
}

fn real_names(level: &Value) -> Vec<String> {
    level["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|node| node["node_type"] != "DUMMY")
        .map(|node| node["name"].as_str().unwrap().to_string())
        .collect()
}

fn dummy_count(level: &Value) -> usize {
    level["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|node| node["node_type"] == "DUMMY")
        .count()
}

#[test]
fn the_release_train_levels_into_seven_contiguous_slices() {
    let mut graph = release_train();
    let model = graph.presentation(None, &Formatters::default()).unwrap();
    let json = serde_json::to_value(&model).unwrap();

    assert_eq!(json["current_pipeline"], "acceptance");
    let levels = json["levels"].as_array().unwrap();
    assert_eq!(levels.len(), 7);

    assert_eq!(real_names(&levels[0]), vec!["git-trunk", "hg-trunk"]);
    assert_eq!(dummy_count(&levels[0]), 0);
    assert_eq!(real_names(&levels[1]), vec!["git-plugins", "cruise"]);
    assert_eq!(dummy_count(&levels[1]), 1);
    assert_eq!(real_names(&levels[2]), vec!["plugins"]);
    assert_eq!(dummy_count(&levels[2]), 2);
    assert_eq!(real_names(&levels[3]), vec!["acceptance"]);
    assert_eq!(real_names(&levels[4]), vec!["deploy-go03", "deploy-go02"]);
    assert_eq!(real_names(&levels[5]), vec!["publish"]);
    assert_eq!(dummy_count(&levels[5]), 1);
    assert_eq!(real_names(&levels[6]), vec!["deploy-go01"]);
}

#[test]
fn every_edge_in_the_projection_descends_exactly_one_level() {
    let mut graph = release_train();
    let model = graph.presentation(None, &Formatters::default()).unwrap();
    let json = serde_json::to_value(&model).unwrap();
    let levels = json["levels"].as_array().unwrap();

    // index every node id by its level
    let mut level_of = std::collections::HashMap::new();
    for (depth, level) in levels.iter().enumerate() {
        for node in level["nodes"].as_array().unwrap() {
            level_of.insert(node["id"].as_str().unwrap().to_string(), depth);
        }
    }

    for level in levels {
        for node in level["nodes"].as_array().unwrap() {
            let from = level_of[node["id"].as_str().unwrap()];
            for dependent in node["dependents"].as_array().unwrap() {
                let to = level_of[dependent.as_str().unwrap()];
                assert_eq!(
                    to,
                    from + 1,
                    "edge {} -> {} skips levels in the rendered model",
                    node["id"],
                    dependent
                );
            }
        }
    }
}

#[test]
fn the_wire_format_matches_the_renderer_contract() {
    let mut graph = ValueStreamGraph::for_pipeline("sample");
    let sample = NodeId::from("sample");
    graph
        .add_upstream_material(
            MaterialDependency::new("hg_fingerprint", "hg", "hg"),
            Some("upstream-repo"),
            &sample,
            MaterialRevision::new(
                Some("hg/repo".to_string()),
                vec![Modification::new(
                    "revision1",
                    "user1",
                    "comment1",
                    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                )],
            ),
        )
        .unwrap();
    graph
        .add_revision(
            &sample,
            PipelineRevision::new(
                "1",
                1,
                vec![StageSummary::new(
                    "defaultStage",
                    StageStatus::Passed,
                    Some(117),
                )],
            ),
        )
        .unwrap();
    graph
        .add_downstream_pipeline(pipeline("downstream"), &sample)
        .unwrap();

    let formatters = Formatters {
        pipeline_history: Some(&|name, counter| format!("/go/pipelines/{name}/{counter}")),
        material_modification: Some(&|fingerprint, revision| {
            format!("/go/materials/{fingerprint}/{revision}")
        }),
        stage_detail: Some(&|name, counter, stage, stage_counter| {
            format!("/go/pipelines/{name}/{counter}/{stage}/{stage_counter}")
        }),
        pipeline_edit: Some(&|name| Some(format!("/go/admin/pipelines/{name}/edit"))),
        humanize_time: Some(&|_| "5 months ago".to_string()),
    };
    let model = graph.presentation(None, &formatters).unwrap();
    let json = serde_json::to_value(&model).unwrap();

    assert_eq!(json["current_pipeline"], "sample");
    assert!(json.get("error").is_none());
    assert!(json.get("current_material").is_none());

    let material = &json["levels"][0]["nodes"][0];
    assert_eq!(material["id"], "hg_fingerprint");
    assert_eq!(material["node_type"], "HG");
    assert_eq!(material["locator"], "");
    assert_eq!(material["depth"], 1);
    assert_eq!(material["dependents"][0], "sample");
    assert_eq!(material["material_names"][0], "upstream-repo");
    assert!(material.get("instances").is_none());
    let modification = &material["material_revisions"][0]["modifications"][0];
    assert_eq!(modification["revision"], "revision1");
    assert_eq!(modification["user"], "user1");
    assert_eq!(modification["comment"], "comment1");
    assert_eq!(modification["modified_time"], "5 months ago");
    assert_eq!(
        modification["locator"],
        "/go/materials/hg_fingerprint/revision1"
    );

    let root = &json["levels"][1]["nodes"][0];
    assert_eq!(root["id"], "sample");
    assert_eq!(root["node_type"], "PIPELINE");
    assert_eq!(root["parents"][0], "hg_fingerprint");
    assert_eq!(root["dependents"][0], "downstream");
    assert_eq!(root["can_edit"], true);
    assert_eq!(root["edit_path"], "/go/admin/pipelines/sample/edit");
    assert_eq!(root["locator"], "/go/pipelines/sample/1");
    assert!(root.get("material_revisions").is_none());
    assert!(root.get("material_names").is_none());

    let instance = &root["instances"][0];
    assert_eq!(instance["label"], "1");
    assert_eq!(instance["counter"], 1);
    assert_eq!(instance["locator"], "/go/pipelines/sample/1");
    let stage = &instance["stages"][0];
    assert_eq!(stage["name"], "defaultStage");
    assert_eq!(stage["status"], "Passed");
    assert_eq!(stage["duration"], 117);
    assert_eq!(stage["locator"], "/go/pipelines/sample/1/defaultStage/1");
}

#[test]
fn a_resolution_failure_short_circuits_the_whole_projection() {
    let mut graph = release_train();
    let model = graph
        .presentation(
            Some("Value stream map is unavailable".to_string()),
            &Formatters::default(),
        )
        .unwrap();
    let json = serde_json::to_value(&model).unwrap();

    assert_eq!(json["error"], "Value stream map is unavailable");
    assert!(json.get("levels").is_none());
    assert!(json.get("current_pipeline").is_none());
}
