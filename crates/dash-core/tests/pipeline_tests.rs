//! End-to-end pipeline runs against in-memory stores

use std::sync::Arc;

use dash_core::render::style_tokens;
use dash_core::{
    BackfillInput, DeployInput, DeploymentStore, GenerationInput, GenerationOutput, Interface, InterfaceId,
    InterfaceVersion, JourneyMode, PlatformType, SessionKey, SessionStore, SpecStore, Todo, TodoStatus, TodoStore,
    CONFIRMATION_REQUIRED, SCHEMA_NOT_READY,
};
use dash_spec::{validate_value, Component, DashboardSpec, DesignTokens, GridPosition, PatchOperation};
use dash_test_utils::{
    make_scenario_payloads, n8n_execution_payloads, overflowing_spec_value, sample_spec, vapi_call_payloads,
    vapi_payloads_without_call_id, FailingAuditSink, PreviewRejectingSessions, RacingDeployments, TestHarness, SOURCE,
    TENANT, THREAD,
};
use dash_workflow::{RunStatus, WorkflowError};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn backfill(harness: &TestHarness, platform: PlatformType) {
    let outcome = harness
        .pipelines
        .backfill
        .execute(harness.scope(), BackfillInput::new(SOURCE, platform))
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Success);
}

async fn generate(harness: &TestHarness, platform: PlatformType) -> GenerationOutput {
    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new(SOURCE, platform))
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Success, "{:?}", outcome.error());
    outcome.into_output().unwrap()
}

#[tokio::test]
async fn backfill_marks_schema_ready() {
    let harness = TestHarness::new(vapi_call_payloads(5));
    let outcome = harness
        .pipelines
        .backfill
        .execute(harness.scope(), BackfillInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();

    let output = outcome.output().unwrap();
    assert_eq!(output.fetched, 5);
    assert_eq!(output.stored, 5);
    assert!(output.schema_ready);
    assert!(output.confidence > 0.0);

    let session = harness
        .store
        .session(&SessionKey::new(TENANT, THREAD))
        .await
        .unwrap()
        .unwrap();
    assert!(session.schema_ready);
    assert_eq!(session.mode, JourneyMode::Recommend);
    assert_eq!(session.source_id.as_deref(), Some(SOURCE));
    assert_eq!(harness.audit.entries_for("backfill.completed").len(), 1);
}

#[tokio::test]
async fn repeated_backfill_stores_nothing_new() {
    let harness = TestHarness::new(vapi_call_payloads(4));
    backfill(&harness, PlatformType::Vapi).await;

    let second = harness
        .pipelines
        .backfill
        .execute(harness.scope(), BackfillInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();
    let output = second.output().unwrap();
    assert_eq!(output.stored, 0);
    assert_eq!(output.skipped, 4);
    assert_eq!(harness.store.event_count(), 4);
}

#[tokio::test]
async fn empty_backfill_leaves_schema_unready() {
    let harness = TestHarness::new(Vec::new());
    let outcome = harness
        .pipelines
        .backfill
        .execute(harness.scope(), BackfillInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();
    assert!(!outcome.output().unwrap().schema_ready);
}

#[tokio::test]
async fn unknown_source_fails_backfill() {
    let harness = TestHarness::new(vapi_call_payloads(1));
    let outcome = harness
        .pipelines
        .backfill
        .execute(harness.scope(), BackfillInput::new("elsewhere", PlatformType::Vapi))
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Failed);
}

#[tokio::test]
async fn generation_requires_backfill() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), SCHEMA_NOT_READY);
}

#[tokio::test]
async fn generation_for_unbackfilled_source_is_not_ready() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new("never-backfilled", PlatformType::Vapi))
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), SCHEMA_NOT_READY);
    assert_eq!(harness.store.interface_count(), 0);
}

#[tokio::test]
async fn backfill_after_preview_keeps_the_journey_phase() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;
    generate(&harness, PlatformType::Vapi).await;
    backfill(&harness, PlatformType::Vapi).await;

    let session = harness
        .store
        .session(&SessionKey::new(TENANT, THREAD))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.mode, JourneyMode::BuildPreview);
    assert!(session.schema_ready);
}

#[tokio::test]
async fn generation_records_style_and_story_choices() {
    let harness = TestHarness::new(vapi_call_payloads(4));
    backfill(&harness, PlatformType::Vapi).await;

    let output = harness
        .pipelines
        .generation
        .execute(
            harness.scope(),
            GenerationInput::new(SOURCE, PlatformType::Vapi)
                .with_style_bundle("dark-ops")
                .with_story("fewer-dropped-calls", "call-quality-review"),
        )
        .await
        .unwrap()
        .into_output()
        .unwrap();

    let version = harness
        .store
        .version(output.preview_version_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.design_tokens, style_tokens("dark-ops").unwrap());

    let session = harness
        .store
        .session(&SessionKey::new(TENANT, THREAD))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.selected_style_bundle_id.as_deref(), Some("dark-ops"));
    assert_eq!(session.selected_outcome.as_deref(), Some("fewer-dropped-calls"));
    assert_eq!(session.selected_storyboard.as_deref(), Some("call-quality-review"));

    // the session choice carries into the next generation
    let next = generate(&harness, PlatformType::Vapi).await;
    let next_version = harness.store.version(next.preview_version_id).await.unwrap().unwrap();
    assert_eq!(next_version.design_tokens, style_tokens("dark-ops").unwrap());
}

#[tokio::test]
async fn failed_session_save_rolls_back_the_preview() {
    let harness = TestHarness::with_stores(vapi_call_payloads(3), |store, stores| {
        stores.with_sessions(Arc::new(PreviewRejectingSessions::new(store.clone())))
    });
    backfill(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), "INTERNAL");
    assert_eq!(harness.store.interface_count(), 0);
    assert_eq!(harness.store.version_count(), 0);

    let session = harness
        .store
        .session(&SessionKey::new(TENANT, THREAD))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.preview_version_id, None);
    assert_eq!(session.mode, JourneyMode::Recommend);
}

#[tokio::test]
async fn failed_session_save_keeps_an_existing_interface() {
    let harness = TestHarness::with_stores(vapi_call_payloads(3), |store, stores| {
        stores.with_sessions(Arc::new(PreviewRejectingSessions::new(store.clone())))
    });
    backfill(&harness, PlatformType::Vapi).await;
    let interface = Interface::draft(TENANT, "Calls");
    let iface = interface.id;
    harness.store.create_interface(interface).await.unwrap();
    harness
        .store
        .append_version(InterfaceVersion::new(iface, sample_spec(), DesignTokens::new()))
        .await
        .unwrap();

    let outcome = harness
        .pipelines
        .generation
        .execute(
            harness.scope(),
            GenerationInput::new(SOURCE, PlatformType::Vapi).with_interface(iface),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert!(harness.store.interface(TENANT, iface).await.unwrap().is_some());
    assert_eq!(harness.store.list_versions(iface).await.unwrap().len(), 1);
}

#[tokio::test]
async fn generation_persists_preview() {
    let harness = TestHarness::new(vapi_call_payloads(6));
    backfill(&harness, PlatformType::Vapi).await;
    let output = generate(&harness, PlatformType::Vapi).await;

    let version = harness
        .store
        .version(output.preview_version_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.interface_id, output.interface_id);
    assert_eq!(version.spec_json.template_id, "voice-call-analytics");
    assert_eq!(version.spec_json.platform_type, "vapi");
    assert!(output
        .preview_url
        .ends_with(&format!("{}?version={}", output.interface_id, output.preview_version_id)));

    let session = harness
        .store
        .session(&SessionKey::new(TENANT, THREAD))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.mode, JourneyMode::BuildPreview);
    assert_eq!(session.preview_version_id, Some(output.preview_version_id));
}

#[tokio::test]
async fn missing_field_suspends_until_mapped() {
    let harness = TestHarness::new(vapi_payloads_without_call_id(4));
    backfill(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Suspended);
    let suspension = outcome.suspension().unwrap();
    assert_eq!(suspension.payload["missingFields"], json!(["call_id"]));
    assert!(suspension.payload["availableFields"]
        .as_array()
        .unwrap()
        .contains(&json!("id")));

    let run_id = outcome.run_id();
    let resumed = harness
        .pipelines
        .generation
        .resume(run_id, json!({"mappings": {"call_id": "id"}}))
        .await
        .unwrap();
    assert_eq!(resumed.status(), RunStatus::Success);
    assert_eq!(harness.pipelines.generation.status(run_id).unwrap(), RunStatus::Success);

    let output = resumed.into_output().unwrap();
    let version = harness
        .store
        .version(output.preview_version_id)
        .await
        .unwrap()
        .unwrap();
    let fields: Vec<_> = version
        .spec_json
        .components
        .iter()
        .filter_map(|c| c.props.get("field"))
        .collect();
    assert!(fields.contains(&&json!("id")));
}

#[tokio::test]
async fn mapping_to_unobserved_field_stays_suspended() {
    let harness = TestHarness::new(vapi_payloads_without_call_id(2));
    backfill(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();
    let resumed = harness
        .pipelines
        .generation
        .resume(outcome.run_id(), json!({"mappings": {"call_id": "nonexistent"}}))
        .await
        .unwrap();

    assert_eq!(resumed.status(), RunStatus::Suspended);
    assert_eq!(resumed.suspension().unwrap().payload["missingFields"], json!(["call_id"]));
}

#[tokio::test]
async fn malformed_resume_is_rejected() {
    let harness = TestHarness::new(vapi_payloads_without_call_id(2));
    backfill(&harness, PlatformType::Vapi).await;
    let outcome = harness
        .pipelines
        .generation
        .execute(harness.scope(), GenerationInput::new(SOURCE, PlatformType::Vapi))
        .await
        .unwrap();

    let err = harness
        .pipelines
        .generation
        .resume(outcome.run_id(), json!({"mappings": "call_id=id"}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidResumeData { .. }));
    assert_eq!(
        harness.pipelines.generation.status(outcome.run_id()).unwrap(),
        RunStatus::Suspended
    );
}

#[tokio::test]
async fn explicit_unknown_template_is_not_found() {
    let harness = TestHarness::new(vapi_call_payloads(2));
    backfill(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .generation
        .execute(
            harness.scope(),
            GenerationInput::new(SOURCE, PlatformType::Vapi).with_template("does-not-exist"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), "NOT_FOUND");
}

#[tokio::test]
async fn workflow_platforms_pick_their_templates() {
    let errors = TestHarness::new(n8n_execution_payloads(6, true));
    backfill(&errors, PlatformType::N8n).await;
    let output = generate(&errors, PlatformType::N8n).await;
    let version = errors.store.version(output.preview_version_id).await.unwrap().unwrap();
    assert_eq!(version.spec_json.template_id, "workflow-error-triage");

    let clean = TestHarness::new(n8n_execution_payloads(4, false));
    backfill(&clean, PlatformType::N8n).await;
    let output = generate(&clean, PlatformType::N8n).await;
    let version = clean.store.version(output.preview_version_id).await.unwrap().unwrap();
    assert_eq!(version.spec_json.template_id, "workflow-execution-monitor");

    let make = TestHarness::new(make_scenario_payloads(3));
    backfill(&make, PlatformType::Make).await;
    let output = generate(&make, PlatformType::Make).await;
    let version = make.store.version(output.preview_version_id).await.unwrap().unwrap();
    assert_eq!(version.spec_json.template_id, "automation-scenario-ops");
}

#[tokio::test]
async fn deploy_requires_confirmation() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .deployment
        .execute(
            harness.scope(),
            DeployInput::new(preview.interface_id, preview.preview_version_id, false),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), CONFIRMATION_REQUIRED);
    assert_eq!(harness.store.deployment_count(), 0);
}

#[tokio::test]
async fn redeploy_demotes_previous_version() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;
    let iface = preview.interface_id;

    let first = harness
        .pipelines
        .deployment
        .execute(harness.scope(), DeployInput::new(iface, preview.preview_version_id, true))
        .await
        .unwrap()
        .into_output()
        .unwrap();
    assert!(first.demoted.is_empty());
    assert!(first.portal_url.ends_with(&format!("/{TENANT}/{iface}")));

    let edit = harness
        .pipelines
        .editor
        .apply_patch(
            TENANT,
            iface,
            &[PatchOperation::SetDesignToken {
                token_path: "color.primary".into(),
                token_value: json!("#112233"),
            }],
        )
        .await
        .unwrap();

    let second = harness
        .pipelines
        .deployment
        .execute(harness.scope(), DeployInput::new(iface, edit.version_id, true))
        .await
        .unwrap()
        .into_output()
        .unwrap();
    assert_eq!(second.demoted, vec![first.deployment_id]);

    let active = harness.store.active_deployments(iface);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.deployment_id);
    assert_eq!(active[0].preview_version_id, edit.version_id);

    let all = harness.store.deployments_for(iface).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(!all.iter().find(|d| d.id == first.deployment_id).unwrap().is_active());
}

#[tokio::test]
async fn deploy_revalidates_the_stored_spec() {
    let harness = TestHarness::new(Vec::new());
    let interface = Interface::draft(TENANT, "Calls");
    let iface = interface.id;
    harness.store.create_interface(interface).await.unwrap();
    let spec = DashboardSpec::from_value(overflowing_spec_value()).unwrap();
    let version = InterfaceVersion::new(iface, spec, DesignTokens::new());
    let version_id = version.id;
    harness.store.append_version(version).await.unwrap();

    let outcome = harness
        .pipelines
        .deployment
        .execute(harness.scope(), DeployInput::new(iface, version_id, true))
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), "VALIDATION_GATE");
    assert_eq!(harness.store.deployment_count(), 0);
    assert!(harness.audit.entries_for("deployment.activated").is_empty());
}

#[tokio::test]
async fn concurrent_deploy_conflicts_without_writing() {
    let harness = TestHarness::with_stores(vapi_call_payloads(3), |store, stores| {
        stores.with_deployments(Arc::new(RacingDeployments::new(store.clone(), TENANT)))
    });
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;
    let deploy = DeployInput::new(preview.interface_id, preview.preview_version_id, true);

    let outcome = harness
        .pipelines
        .deployment
        .execute(harness.scope(), deploy.clone())
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.error().unwrap().kind_code(), "CONFLICT");
    let active = harness.store.active_deployments(preview.interface_id);
    assert_eq!(active.len(), 1);
    assert_eq!(harness.store.deployment_count(), 1);

    // a fresh run observes the competing row and replaces it
    let retry = harness
        .pipelines
        .deployment
        .execute(harness.scope(), deploy)
        .await
        .unwrap()
        .into_output()
        .unwrap();
    assert_eq!(retry.demoted, vec![active[0].id]);
    assert_eq!(harness.store.active_deployments(preview.interface_id).len(), 1);
}

#[tokio::test]
async fn version_from_another_interface_is_not_found() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .deployment
        .execute(
            harness.scope(),
            DeployInput::new(InterfaceId::new(), preview.preview_version_id, true),
        )
        .await
        .unwrap();
    assert_eq!(outcome.error().unwrap().kind_code(), "NOT_FOUND");

    let second = generate(&harness, PlatformType::Vapi).await;
    let outcome = harness
        .pipelines
        .deployment
        .execute(
            harness.scope(),
            DeployInput::new(preview.interface_id, second.preview_version_id, true),
        )
        .await
        .unwrap();
    assert_eq!(outcome.error().unwrap().kind_code(), "NOT_FOUND");
    assert_eq!(harness.store.deployment_count(), 0);
}

#[tokio::test]
async fn deploy_survives_audit_outage() {
    let harness = TestHarness::with_audit_sink(vapi_call_payloads(3), Arc::new(FailingAuditSink));
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;

    let outcome = harness
        .pipelines
        .deployment
        .execute(
            harness.scope(),
            DeployInput::new(preview.interface_id, preview.preview_version_id, true),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Success);
    assert_eq!(harness.store.active_deployments(preview.interface_id).len(), 1);
    assert!(harness.audit.entries().is_empty());
}

#[tokio::test]
async fn deploy_completes_interface_todos() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;
    harness
        .store
        .add_todo(Todo::open(TENANT, THREAD, "deploy", "Publish dashboard").with_subject(preview.interface_id.to_string()))
        .await
        .unwrap();

    harness
        .pipelines
        .deployment
        .execute(
            harness.scope(),
            DeployInput::new(preview.interface_id, preview.preview_version_id, true),
        )
        .await
        .unwrap();

    let todos = harness.store.todos(TENANT).await.unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].status, TodoStatus::Done);

    let session = harness
        .store
        .session(&SessionKey::new(TENANT, THREAD))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.mode, JourneyMode::Deploy);
}

#[tokio::test]
async fn audit_chain_covers_every_pipeline() {
    let harness = TestHarness::new(vapi_call_payloads(3));
    backfill(&harness, PlatformType::Vapi).await;
    let preview = generate(&harness, PlatformType::Vapi).await;
    harness
        .pipelines
        .deployment
        .execute(
            harness.scope(),
            DeployInput::new(preview.interface_id, preview.preview_version_id, true),
        )
        .await
        .unwrap();

    let entries = harness.audit.entries();
    let actions: Vec<_> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["backfill.completed", "deployment.activated"]);
    harness.audit.verify_integrity().unwrap();
}

#[tokio::test]
async fn runs_share_one_registry() {
    let harness = TestHarness::new(vapi_call_payloads(2));
    backfill(&harness, PlatformType::Vapi).await;
    generate(&harness, PlatformType::Vapi).await;

    let runs = harness.pipelines.runs().list_for_thread(THREAD);
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Success));
}

#[test]
fn overflowing_spec_scores_one_error() {
    let result = validate_value(&overflowing_spec_value());
    assert!(!result.valid);
    assert_eq!(result.score, 0.9);
    assert!(result.errors[0].contains("exceeds grid width"));
}

#[tokio::test]
async fn editor_rejects_overflowing_component() {
    let harness = TestHarness::new(Vec::new());
    let interface = Interface::draft(TENANT, "Calls");
    let iface = interface.id;
    harness.store.create_interface(interface).await.unwrap();
    harness
        .store
        .append_version(InterfaceVersion::new(iface, sample_spec(), DesignTokens::new()))
        .await
        .unwrap();

    let err = harness
        .pipelines
        .editor
        .apply_patch(
            TENANT,
            iface,
            &[PatchOperation::AddComponent {
                component: Component::new("wide", "chart", GridPosition::new(8, 7, 6, 3)),
            }],
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_GATE");
    assert_eq!(harness.store.list_versions(iface).await.unwrap().len(), 1);

    let accepted = harness
        .pipelines
        .editor
        .apply_patch(
            TENANT,
            iface,
            &[PatchOperation::ReorderComponents {
                ordered_ids: vec!["recent-calls".into()],
            }],
        )
        .await
        .unwrap();
    let latest = harness.store.latest_version(iface).await.unwrap().unwrap();
    assert_eq!(latest.id, accepted.version_id);
    assert_eq!(
        latest.spec_json.component_ids(),
        vec!["recent-calls", "total-calls", "avg-duration"]
    );
}
