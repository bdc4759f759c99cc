use pokebattle_db::MemoryStore;
use pokebattle_kernel::settings::BootstrapSettings;
use pokebattle_kernel::{
    verify, Bootstrap, BootstrapError, Credential, DocumentStore, ResourceKind, RoleGrant, Step,
    STEP_ORDER,
};

fn settings() -> BootstrapSettings {
    BootstrapSettings::new(
        Credential::new("root", "rootpass"),
        Credential::new("pokeuser", "pokepass"),
        "pokemon",
    )
}

fn fresh_instance() -> MemoryStore {
    MemoryStore::with_root("root", "rootpass")
}

fn root_cause(error: &anyhow::Error) -> &BootstrapError {
    error
        .downcast_ref::<BootstrapError>()
        .expect("bootstrap failures carry a BootstrapError")
}

#[tokio::test]
async fn fresh_instance_ends_fully_provisioned() {
    let settings = settings();
    let mut store = fresh_instance();

    let report = Bootstrap::new(&settings).run(&mut store).await.unwrap();

    assert_eq!(report.completed, STEP_ORDER.to_vec());
    assert_eq!(store.database_names(), vec!["admin", "pokemon"]);
    assert_eq!(store.user_names("pokemon"), vec!["pokeuser"]);
    assert_eq!(
        store.user_roles("pokeuser").await.unwrap(),
        Some(vec![RoleGrant {
            role: "readWrite".to_string(),
            db: "pokemon".to_string(),
        }])
    );
    assert_eq!(store.collection_names("pokemon"), vec!["battle"]);
    assert_eq!(store.document_count("battle").await.unwrap(), Some(0));
    assert!(store.accepts("pokemon", &Credential::new("pokeuser", "pokepass")));

    let verified = verify(&settings, &mut store).await.unwrap();
    assert!(verified.is_provisioned(), "{:?}", verified.problems);
}

#[tokio::test]
async fn second_run_fails_on_duplicate_user_and_keeps_first_state() {
    let settings = settings();
    let mut store = fresh_instance();
    Bootstrap::new(&settings).run(&mut store).await.unwrap();

    let mut rerun = settings.clone();
    rerun.app_password = "otherpass".to_string();
    let error = Bootstrap::new(&rerun).run(&mut store).await.unwrap_err();

    assert!(error.to_string().contains(Step::CreateUser.name()));
    assert!(matches!(
        root_cause(&error),
        BootstrapError::Duplicate {
            kind: ResourceKind::User,
            ..
        }
    ));
    assert!(store.accepts("pokemon", &Credential::new("pokeuser", "pokepass")));
    assert_eq!(store.user_names("pokemon"), vec!["pokeuser"]);
    assert_eq!(store.collection_names("pokemon"), vec!["battle"]);
}

#[tokio::test]
async fn existing_collection_is_fatal() {
    let mut settings = settings();
    let mut store = fresh_instance();
    Bootstrap::new(&settings).run(&mut store).await.unwrap();

    // A different application user gets through user creation, then trips
    // over the collection left by the first run.
    settings.app_username = "trainer".to_string();
    let error = Bootstrap::new(&settings).run(&mut store).await.unwrap_err();

    assert!(error.to_string().contains(Step::CreateCollection.name()));
    assert!(matches!(
        root_cause(&error),
        BootstrapError::Duplicate {
            kind: ResourceKind::Collection,
            ..
        }
    ));
    assert_eq!(store.user_names("pokemon"), vec!["pokeuser", "trainer"]);
}

#[tokio::test]
async fn missing_admin_values_fail_at_authentication() {
    let cases: [fn(&mut BootstrapSettings); 2] = [
        |s| s.admin_username.clear(),
        |s| s.admin_password.clear(),
    ];

    for clear in cases {
        let mut settings = settings();
        clear(&mut settings);
        let mut store = fresh_instance();

        let error = Bootstrap::new(&settings).run(&mut store).await.unwrap_err();

        assert!(error.to_string().contains(Step::Authenticate.name()));
        assert!(matches!(
            root_cause(&error),
            BootstrapError::Authentication { .. }
        ));
        assert_eq!(store.database_names(), vec!["admin"]);
    }
}

#[tokio::test]
async fn missing_app_values_fail_at_user_creation() {
    let cases: [(fn(&mut BootstrapSettings), &str); 3] = [
        (|s| s.app_username.clear(), "app_username"),
        (|s| s.app_password.clear(), "app_password"),
        (|s| s.app_database.clear(), "app_database"),
    ];

    for (clear, field) in cases {
        let mut settings = settings();
        clear(&mut settings);
        let mut store = fresh_instance();

        let error = Bootstrap::new(&settings).run(&mut store).await.unwrap_err();

        assert!(error.to_string().contains(Step::CreateUser.name()));
        match root_cause(&error) {
            BootstrapError::MissingSetting(missing) => assert_eq!(*missing, field),
            other => panic!("expected missing setting, got {other:?}"),
        }
        assert_eq!(store.database_names(), vec!["admin"]);
    }
}

#[tokio::test]
async fn rejected_admin_password_creates_nothing() {
    let mut settings = settings();
    settings.admin_password = "wrong".to_string();
    let mut store = fresh_instance();

    let error = Bootstrap::new(&settings).run(&mut store).await.unwrap_err();

    assert!(matches!(
        root_cause(&error),
        BootstrapError::Authentication { .. }
    ));
    assert_eq!(store.database_names(), vec!["admin"]);
}

#[tokio::test]
async fn unreachable_database_fails_at_authentication() {
    let settings = settings();
    let mut store = MemoryStore::unreachable();

    let error = Bootstrap::new(&settings).run(&mut store).await.unwrap_err();

    assert!(error.to_string().contains(Step::Authenticate.name()));
    assert!(matches!(root_cause(&error), BootstrapError::Connectivity(_)));
}

#[tokio::test]
async fn admin_without_user_management_rights_fails_at_user_creation() {
    let settings = settings();
    let mut store = MemoryStore::new().with_admin_user(
        "root",
        "rootpass",
        vec![RoleGrant {
            role: "readWriteAnyDatabase".to_string(),
            db: "admin".to_string(),
        }],
    );

    let error = Bootstrap::new(&settings).run(&mut store).await.unwrap_err();

    assert!(error.to_string().contains(Step::CreateUser.name()));
    assert!(matches!(root_cause(&error), BootstrapError::Privilege { .. }));
    assert_eq!(store.selected_database(), Some("pokemon"));
    assert!(store.collection_names("pokemon").is_empty());
}

#[tokio::test]
async fn verification_flags_documents_written_after_bootstrap() {
    let settings = settings();
    let mut store = fresh_instance();
    Bootstrap::new(&settings).run(&mut store).await.unwrap();
    store.insert_documents("pokemon", "battle", 1).unwrap();

    let report = verify(&settings, &mut store).await.unwrap();

    assert!(!report.is_provisioned());
    assert_eq!(report.collection_documents, Some(1));
}

#[tokio::test]
async fn dyn_store_is_accepted() {
    let settings = settings();
    let mut store: Box<dyn DocumentStore> = Box::new(fresh_instance());

    let report = Bootstrap::new(&settings).run(store.as_mut()).await.unwrap();

    assert_eq!(report.database, "pokemon");
    assert_eq!(report.user, "pokeuser");
}
