use permit_api::models::{ConditionSet, ConditionSetType, ResourceRef};
use permit_api::testing::InMemoryPermitApi;
use permit_api::ApiError;
use serde_json::json;
use terraform_export::{export_terraform, ExportError, ExportOptions};

fn condition_set(key: &str, set_type: ConditionSetType, conditions: serde_json::Value) -> ConditionSet {
    ConditionSet {
        key: key.to_string(),
        name: key.to_string(),
        description: None,
        set_type,
        resource: match set_type {
            ConditionSetType::Resourceset => Some(ResourceRef {
                key: "project".to_string(),
            }),
            ConditionSetType::Userset => None,
        },
        conditions,
    }
}

fn populated() -> InMemoryPermitApi {
    InMemoryPermitApi::new()
        .with_resource("team", "Team", &["get"])
        .with_resource("project", "Project", &["get", "delete"])
        .with_role("admin", &["project:delete", "team:get"])
        .with_resource_role("project", "viewer", &["get"])
        .with_relation("project", "owner", "team")
        .with_condition_set(condition_set(
            "eu_projects",
            ConditionSetType::Resourceset,
            json!({"allOf": [{"resource.region": {"equals": "eu"}}]}),
        ))
        .with_condition_set(condition_set(
            "broken",
            ConditionSetType::Userset,
            json!(["not", "an", "object"]),
        ))
}

fn position(hcl: &str, needle: &str) -> usize {
    hcl.find(needle)
        .unwrap_or_else(|| panic!("{} missing from:\n{}", needle, hcl))
}

#[tokio::test]
async fn test_export_orders_blocks_by_dependency() {
    let api = populated();
    let export = export_terraform(&api, &ExportOptions::default()).await.unwrap();
    let hcl = &export.hcl;

    let provider = position(hcl, "provider \"permitio\"");
    let project = position(hcl, "resource \"permitio_resource\" \"project\"");
    let team = position(hcl, "resource \"permitio_resource\" \"team\"");
    let admin = position(hcl, "resource \"permitio_role\" \"admin\"");
    let viewer = position(hcl, "resource \"permitio_role\" \"project__viewer\"");
    let owner = position(hcl, "resource \"permitio_relation\" \"project_owner\"");
    let set = position(hcl, "resource \"permitio_resource_set\" \"eu_projects\"");

    assert!(provider < project);
    assert!(project < team);
    assert!(team < admin);
    assert!(admin < viewer);
    assert!(viewer < owner);
    assert!(owner < set);

    assert!(hcl.contains("depends_on  = [permitio_resource.project, permitio_resource.team]"));
    assert_eq!(export.resources, 2);
    assert_eq!(export.roles, 1);
    assert_eq!(export.resource_roles, 1);
    assert_eq!(export.relations, 1);
}

#[tokio::test]
async fn test_invalid_condition_set_is_skipped_with_warning() {
    let api = populated();
    let export = export_terraform(&api, &ExportOptions::default()).await.unwrap();

    assert_eq!(export.condition_sets, 1);
    assert!(!export.hcl.contains("\"broken\""));
    assert_eq!(export.warnings.len(), 1);
    assert!(export.warnings[0].contains("'broken'"));
}

#[tokio::test]
async fn test_resource_listing_failure_is_fatal() {
    let api = populated();
    api.fail_on("list_resources", ApiError::Transport("refused".to_string()));

    let err = export_terraform(&api, &ExportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Fetch { collection: "resources", .. }));
}

#[tokio::test]
async fn test_other_listing_failures_are_warnings() {
    let api = populated();
    api.fail_on(
        "list_roles",
        ApiError::Http {
            status: 403,
            message: "forbidden".to_string(),
        },
    );
    api.fail_on("list_relations", ApiError::Transport("reset".to_string()));

    let export = export_terraform(&api, &ExportOptions::default()).await.unwrap();

    assert_eq!(export.roles, 0);
    assert_eq!(export.relations, 0);
    assert_eq!(export.resource_roles, 1);
    assert!(export.warnings.iter().any(|w| w.starts_with("Skipping roles:")));
    assert_eq!(
        export
            .warnings
            .iter()
            .filter(|w| w.starts_with("Skipping relations of resource"))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_export_makes_no_writes() {
    let api = populated();
    export_terraform(&api, &ExportOptions::default()).await.unwrap();
    assert_eq!(api.write_count(), 0);
}
