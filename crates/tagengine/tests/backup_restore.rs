//! Backup and restore against the in-memory backend.

use armkit::backend::memory::{Fault, FaultPoint, MutationTarget};
use armkit::{CallContext, MemoryBackend, PLATFORM_AZURE, Resource, Tags, TypedEndpoint};
use tagengine::{Backup, BackupEntry, BackupManager, Error, Executor, RuleSet, Scanner, evaluate};
use tempfile::TempDir;

fn resource(id: &str, kind: &str, tags: Tags) -> Resource {
    let parsed = armkit::resource_id::parse(id).unwrap();
    Resource {
        id: id.to_string(),
        name: parsed.resource_name,
        region: "northeurope".to_string(),
        resource_group: parsed.resource_group,
        platform: PLATFORM_AZURE.to_string(),
        kind: kind.to_string(),
        tags,
    }
}

fn disk(name: &str, tags: Tags) -> Resource {
    resource(
        &format!("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/disks/{name}"),
        "Microsoft.Compute/disks",
        tags,
    )
}

fn tags(pairs: &[(&str, Option<&str>)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
        .collect()
}

fn clean_everything() -> RuleSet {
    RuleSet::from_json_str(
        r#"{"rules": [{"name": "wipe", "actions": [{"type": "cleanTags"}]}]}"#,
    )
    .unwrap()
}

#[test]
fn test_restore_undoes_apply() {
    let backend = MemoryBackend::new();
    let a = disk("a", tags(&[("env", Some("prod")), ("flag", None)]));
    let b = disk("b", Tags::new());
    backend.add_resource(a.clone());
    backend.add_resource(b.clone());

    let ctx = CallContext::new();
    let dir = TempDir::new().unwrap();
    let outcome = Scanner::new(&backend).scan_all(&ctx).unwrap();
    let table = evaluate(&clean_everything().rules, &outcome.resources);

    let manager = BackupManager::new(&backend);
    let path = manager.create(&ctx, &table, dir.path()).unwrap();
    Executor::new(&backend).execute(&ctx, &table, false).unwrap();
    assert_eq!(backend.tags(&a.id), Some(Tags::new()));

    let backup = Backup::load(&path).unwrap();
    let summary = manager.restore(&ctx, &backup).unwrap();

    assert_eq!(summary.restored, 2);
    assert_eq!(backend.tags(&a.id), Some(a.tags));
    assert_eq!(backend.tags(&b.id), Some(b.tags));
}

#[test]
fn test_snapshot_reads_current_state() {
    let backend = MemoryBackend::new();
    let a = disk("a", tags(&[("env", Some("dev"))]));
    backend.add_resource(a.clone());

    let ctx = CallContext::new();
    let outcome = Scanner::new(&backend).scan_all(&ctx).unwrap();
    let table = evaluate(&clean_everything().rules, &outcome.resources);

    // Changed after the scan; the snapshot must see it.
    backend.set_tags(&a.id, tags(&[("env", Some("prod"))]));
    let backup = BackupManager::new(&backend).snapshot(&ctx, &table).unwrap();

    assert_eq!(
        backup.entries(),
        [BackupEntry {
            id: a.id.clone(),
            tags: tags(&[("env", Some("prod"))]),
        }]
    );
}

#[test]
fn test_restore_routes_virtual_networks() {
    let backend = MemoryBackend::new();
    let vnet = resource(
        "/subscriptions/sub/resourceGroups/rg-net/providers/Microsoft.Network/virtualNetworks/vnet1",
        "Microsoft.Network/virtualNetworks",
        Tags::new(),
    );
    backend.add_resource(vnet.clone());

    let backup = Backup::new(vec![BackupEntry {
        id: vnet.id.clone(),
        tags: tags(&[("owner", Some("net-team"))]),
    }]);
    BackupManager::new(&backend)
        .restore(&CallContext::new(), &backup)
        .unwrap();

    let mutations = backend.mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(
        &mutations[0].target,
        MutationTarget::Typed { endpoint: TypedEndpoint::VirtualNetwork, group, name }
            if group == "rg-net" && name == "vnet1"
    ));
    assert_eq!(backend.tags(&vnet.id), Some(tags(&[("owner", Some("net-team"))])));
}

#[test]
fn test_restore_of_deleted_resource_fails_fast() {
    let backend = MemoryBackend::new();
    let a = disk("a", Tags::new());
    let c = disk("c", Tags::new());
    backend.add_resource(a.clone());
    backend.add_resource(c.clone());

    let backup = Backup::new(vec![
        BackupEntry {
            id: a.id.clone(),
            tags: tags(&[("env", Some("prod"))]),
        },
        BackupEntry {
            id: disk("b-deleted", Tags::new()).id,
            tags: Tags::new(),
        },
        BackupEntry {
            id: c.id.clone(),
            tags: tags(&[("env", Some("prod"))]),
        },
    ]);

    let err = BackupManager::new(&backend)
        .restore(&CallContext::new(), &backup)
        .unwrap_err();

    match err {
        Error::Restore {
            resource_id,
            restored,
            source,
        } => {
            assert!(resource_id.ends_with("b-deleted"));
            assert_eq!(restored, 1);
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.tags(&a.id), Some(tags(&[("env", Some("prod"))])));
    assert_eq!(backend.tags(&c.id), Some(Tags::new()));
}

#[test]
fn test_snapshot_failure_names_resource() {
    let backend = MemoryBackend::new();
    let a = disk("a", Tags::new());
    backend.add_resource(a.clone());

    let ctx = CallContext::new();
    let outcome = Scanner::new(&backend).scan_all(&ctx).unwrap();
    let table = evaluate(&clean_everything().rules, &outcome.resources);
    backend.inject_fault(FaultPoint::GetResource(a.id.clone()), Fault::Rejected, 1);

    let err = BackupManager::new(&backend).snapshot(&ctx, &table).unwrap_err();
    assert!(matches!(err, Error::Snapshot { resource_id, .. } if resource_id == a.id));
}
