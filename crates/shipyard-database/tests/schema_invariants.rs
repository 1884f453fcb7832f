//! End-to-end checks of the persisted schema through the public stores.
//!
//! Everything runs on a migrated in-memory SQLite database. The PostgreSQL
//! variant at the bottom needs Docker and is ignored by default.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use serde_json::json;
use shipyard_database::stores::{
    ApiKeyStore, ComplianceStore, DeploymentStore, DomainStore, EncryptedValue, EnvVarStore, NewAuditLog,
    NewProject, NewService, NewUser, ProjectStore, ServiceStore, UserStore,
};
use shipyard_database::test_utils::TestDatabase;
use shipyard_database::{DbError, Repository};
use shipyard_entities::types::{DeploymentStatus, RepositoryProvider, ServiceType};
use shipyard_entities::{
    audit_logs, deployments, domains, environment_variables, projects, services, users,
    EnvVarScope, NullableJson, ServiceSource,
};

struct Seeded {
    user: users::Model,
    project: projects::Model,
    service: services::Model,
    deployment: deployments::Model,
}

async fn seed(test_db: &TestDatabase) -> anyhow::Result<Seeded> {
    let db = test_db.db.clone();
    let user = UserStore::new(db.clone())
        .create(NewUser::new("a@b.com", "argon2-hash"))
        .await?;
    let project = ProjectStore::new(db.clone())
        .create(NewProject {
            slug: Some("demo".to_string()),
            ..NewProject::new(user.id, "Demo")
        })
        .await?;
    let service = ServiceStore::new(db.clone())
        .create(NewService::new(
            project.id,
            "api",
            ServiceType::Docker,
            ServiceSource::image("ghcr.io/acme/api", "v1"),
        ))
        .await?;
    let deployment = DeploymentStore::new(db)
        .create(service.id, "api-1", None)
        .await?;
    Ok(Seeded {
        user,
        project,
        service,
        deployment,
    })
}

async fn assert_lineage(test_db: &TestDatabase) -> anyhow::Result<()> {
    let seeded = seed(test_db).await?;
    assert_eq!(seeded.deployment.status, DeploymentStatus::Pending);

    let lineage = DeploymentStore::new(test_db.db.clone())
        .find_with_lineage(seeded.deployment.id)
        .await?;
    assert_eq!(lineage.deployment.id, seeded.deployment.id);
    assert_eq!(lineage.service.id, seeded.service.id);
    assert_eq!(lineage.project.id, seeded.project.id);
    assert_eq!(lineage.user.id, seeded.user.id);
    assert_eq!(lineage.project.slug, "demo");
    assert_eq!(lineage.user.email, "a@b.com");
    Ok(())
}

async fn assert_unique_email(test_db: &TestDatabase) -> anyhow::Result<()> {
    let store = UserStore::new(test_db.db.clone());
    store.create(NewUser::new("dup@example.com", "h1")).await?;

    let err = store
        .create(NewUser::new("Dup@Example.com", "h2"))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn deployment_lineage_returns_whole_chain() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    assert_lineage(&test_db).await
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    assert_unique_email(&test_db).await?;

    // The constraint holds below the store as well
    let err = Repository::<users::Entity>::new(test_db.db.clone())
        .insert(users::ActiveModel {
            email: Set("dup@example.com".to_string()),
            password_hash: Set("h3".to_string()),
            is_email_verified: Set(false),
            is_active: Set(true),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn domain_is_unique_across_deployments() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    let seeded = seed(&test_db).await?;
    let other = DeploymentStore::new(test_db.db.clone())
        .create(seeded.service.id, "api-2", None)
        .await?;
    let store = DomainStore::new(test_db.db.clone());

    store.attach(seeded.deployment.id, "api.acme.dev").await?;
    let err = store.attach(other.id, "api.acme.dev").await.unwrap_err();
    assert!(err.is_unique_violation(), "got {:?}", err);

    assert!(store.list_for_deployment(other.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn project_slug_is_not_globally_unique() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    let seeded = seed(&test_db).await?;
    let other_user = UserStore::new(test_db.db.clone())
        .create(NewUser::new("c@d.com", "h"))
        .await?;
    let store = ProjectStore::new(test_db.db.clone());

    let again = store.create(NewProject::new(other_user.id, "Demo")).await?;
    assert_eq!(again.slug, seeded.project.slug);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = store.create(NewProject::new(seeded.user.id, "demo")).await?;
    let found = store.find_by_slug(seeded.user.id, "demo").await?;
    assert_eq!(found.map(|p| p.id), Some(newer.id));
    Ok(())
}

#[tokio::test]
async fn deleting_a_user_cascades_down_the_chain() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    let seeded = seed(&test_db).await?;
    let db = test_db.db.clone();

    DomainStore::new(db.clone())
        .attach(seeded.deployment.id, "api.acme.dev")
        .await?;
    let env = EnvVarStore::new(db.clone());
    let value = EncryptedValue {
        ciphertext: "c".to_string(),
        iv: "i".to_string(),
    };
    env.set(EnvVarScope::Project(seeded.project.id), "A", value.clone(), false)
        .await?;
    env.set(EnvVarScope::Deployment(seeded.deployment.id), "B", value, true)
        .await?;

    assert!(
        Repository::<users::Entity>::new(db.clone())
            .delete(seeded.user.id)
            .await?
    );

    let all = Condition::all();
    assert_eq!(Repository::<projects::Entity>::new(db.clone()).count(all.clone()).await?, 0);
    assert_eq!(Repository::<services::Entity>::new(db.clone()).count(all.clone()).await?, 0);
    assert_eq!(Repository::<deployments::Entity>::new(db.clone()).count(all.clone()).await?, 0);
    assert_eq!(Repository::<domains::Entity>::new(db.clone()).count(all.clone()).await?, 0);
    assert_eq!(
        Repository::<environment_variables::Entity>::new(db)
            .count(all)
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn service_round_trips_by_primary_key() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    let seeded = seed(&test_db).await?;
    let store = ServiceStore::new(test_db.db.clone());

    let created = store
        .create(NewService::new(
            seeded.project.id,
            "worker",
            ServiceType::Worker,
            ServiceSource::repository("https://github.com/acme/worker", "main"),
        ))
        .await?;
    let read = store.get(created.id).await?;

    assert_eq!(read, created);
    assert_eq!(read.repository_provider, Some(RepositoryProvider::Github));
    assert_eq!(read.port, 3000);
    assert_eq!(read.memory_limit, "512Mi");
    assert!(read.docker_image.is_none());
    Ok(())
}

#[tokio::test]
async fn audit_metadata_keeps_json_null_apart_from_sql_null() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    let store = ComplianceStore::new(test_db.db.clone());

    for (action, metadata) in [
        ("json-null", NullableJson::JsonNull),
        ("db-null", NullableJson::DbNull),
        ("value", NullableJson::Value(json!({"ip": "10.0.0.1"}))),
    ] {
        store
            .record_audit(NewAuditLog {
                metadata,
                ..NewAuditLog::new(action, "test")
            })
            .await?;
    }

    let logs = Repository::<audit_logs::Entity>::new(test_db.db.clone());
    let by_action = |action: &'static str| {
        let logs = logs.clone();
        async move {
            logs.find_one(Condition::all().add(audit_logs::Column::Action.eq(action)))
                .await
        }
    };

    let json_null = by_action("json-null").await?.map(|l| l.metadata);
    let db_null = by_action("db-null").await?.map(|l| l.metadata);
    let value = by_action("value").await?.map(|l| l.metadata);
    assert_eq!(json_null, Some(Some(serde_json::Value::Null)));
    assert_eq!(db_null, Some(None));
    assert_eq!(value, Some(Some(json!({"ip": "10.0.0.1"}))));
    Ok(())
}

#[tokio::test]
async fn concurrent_api_keys_get_distinct_hashes() -> anyhow::Result<()> {
    let test_db = TestDatabase::sqlite().await?;
    let seeded = seed(&test_db).await?;
    let store = ApiKeyStore::new(test_db.db.clone());
    let keys = &store;
    let user_id = seeded.user.id;

    let issued = futures::future::try_join_all((0..5).map(|i| async move {
        let name = format!("ci-{}", i);
        keys.issue(user_id, &name, None).await
    }))
    .await?;

    let mut hashes: Vec<&str> = issued.iter().map(|k| k.model.key_hash.as_str()).collect();
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), 5);
    assert_eq!(store.list_for_user(seeded.user.id).await?.len(), 5);
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn postgres_schema_invariants() -> anyhow::Result<()> {
    let test_db = TestDatabase::postgres().await?;
    assert_lineage(&test_db).await?;
    assert_unique_email(&test_db).await?;
    Ok(())
}
