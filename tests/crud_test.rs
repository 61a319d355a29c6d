mod common;

use common::{includes, record, setup_service};
use footprint_sdk::{AppError, Criteria, IdOrCriteria, QueryOptions, Records};
use serde_json::{json, Value};

#[tokio::test]
async fn create_inserts_a_record() {
    let service = setup_service().await;
    let role = service
        .create("Role", record(json!({ "name": "createtest" })), QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(role["name"], json!("createtest"));
    assert!(role["id"].is_i64());
    assert!(role["created_at"].is_string());
    assert!(role["updated_at"].is_string());
}

#[tokio::test]
async fn create_ignores_id_and_timestamps_in_payload() {
    let service = setup_service().await;
    let role = service
        .create(
            "Role",
            record(json!({ "id": 999, "name": "manual", "created_at": "bogus", "updated_at": "bogus" })),
            QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_ne!(role["id"], json!(999));
    assert_ne!(role["created_at"], json!("bogus"));
    assert_ne!(role["updated_at"], json!("bogus"));
}

#[tokio::test]
async fn model_names_are_case_insensitive() {
    let service = setup_service().await;
    let role = service
        .create("role", record(json!({ "name": "lower" })), QueryOptions::default())
        .await
        .unwrap();
    let found = service
        .find("ROLE", IdOrCriteria::Id(role["id"].clone()), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(found.one(), Some(role));
}

#[tokio::test]
async fn unknown_model_is_rejected() {
    let service = setup_service().await;
    let err = service
        .create("Ghost", record(json!({ "name": "boo" })), QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ModelNotFound(name) if name == "Ghost"));
}

#[tokio::test]
async fn find_by_id_returns_one_record() {
    let service = setup_service().await;
    let role = service
        .create("Role", record(json!({ "name": "findtest" })), QueryOptions::default())
        .await
        .unwrap();

    let found = service
        .find("Role", IdOrCriteria::Id(role["id"].clone()), QueryOptions::default())
        .await
        .unwrap();
    assert!(matches!(found, Records::One(Some(_))));
    assert_eq!(found.one().unwrap()["name"], json!("findtest"));
}

#[tokio::test]
async fn find_by_missing_id_respects_require() {
    let service = setup_service().await;
    let found = service.find("Role", 404i64, QueryOptions::default()).await.unwrap();
    assert_eq!(found, Records::One(None));

    let err = service.find("Role", 404i64, QueryOptions::required()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn find_by_criteria_returns_a_list() {
    let service = setup_service().await;
    for name in ["findwhere", "other"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }

    let found = service
        .find("Role", Criteria::new().where_eq("name", "findwhere"), QueryOptions::default())
        .await
        .unwrap();
    let rows = found.many();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("findwhere"));
}

#[tokio::test]
async fn find_pages_and_orders() {
    let service = setup_service().await;
    for name in ["b", "c", "a"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }

    let names = |rows: Vec<footprint_sdk::Record>| rows.into_iter().map(|r| r["name"].clone()).collect::<Vec<Value>>();

    let all = service.find("Role", Criteria::new(), QueryOptions::default()).await.unwrap();
    assert_eq!(names(all.many()), vec![json!("b"), json!("c"), json!("a")]);

    let sorted = service
        .find(
            "Role",
            Criteria::new().order_by("name", footprint_sdk::Direction::Desc).offset(1),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(names(sorted.many()), vec![json!("b"), json!("a")]);

    let options = QueryOptions {
        limit: Some(2),
        require: false,
    };
    assert_eq!(service.find("Role", Criteria::new(), options).await.unwrap().len(), 2);
    // the criteria's own limit beats the per-call option
    assert_eq!(service.find("Role", Criteria::new().limit(1), options).await.unwrap().len(), 1);
}

#[tokio::test]
async fn configured_default_limit_applies() {
    let service = setup_service().await;
    assert_eq!(service.default_limit(), 50);
    for i in 0..55 {
        service
            .create("Role", record(json!({ "name": format!("r{}", i) })), QueryOptions::default())
            .await
            .unwrap();
    }
    let page = service.find("Role", Criteria::new(), QueryOptions::default()).await.unwrap();
    assert_eq!(page.len(), 50);
}

#[tokio::test]
async fn update_by_criteria_returns_updated_rows() {
    let service = setup_service().await;
    service
        .create("Role", record(json!({ "name": "updatetest" })), QueryOptions::default())
        .await
        .unwrap();

    let updated = service
        .update(
            "Role",
            Criteria::new().where_eq("name", "updatetest"),
            record(json!({ "name": "updated" })),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    let rows = updated.many();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("updated"));

    let stale = service
        .find("Role", Criteria::new().where_eq("name", "updatetest"), QueryOptions::default())
        .await
        .unwrap();
    assert!(stale.is_empty());
}

#[tokio::test]
async fn update_by_criteria_reports_every_row_holding_the_new_values() {
    let service = setup_service().await;
    for name in ["before", "target"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }

    let updated = service
        .update(
            "Role",
            Criteria::new().where_eq("name", "before"),
            record(json!({ "name": "target" })),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated.many().iter().all(|r| r["name"] == json!("target")));
}

#[tokio::test]
async fn update_with_only_auto_values_returns_matched_rows() {
    let service = setup_service().await;
    let role = service
        .create("Role", record(json!({ "name": "steady" })), QueryOptions::default())
        .await
        .unwrap();

    let updated = service
        .update(
            "Role",
            Criteria::new().where_eq("name", "steady"),
            record(json!({ "id": 77 })),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    let rows = updated.many();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], role["id"]);
}

#[tokio::test]
async fn update_by_id_returns_one_record() {
    let service = setup_service().await;
    let role = service
        .create("Role", record(json!({ "name": "byid" })), QueryOptions::default())
        .await
        .unwrap();

    let updated = service
        .update(
            "Role",
            IdOrCriteria::Id(role["id"].clone()),
            record(json!({ "name": "renamed" })),
            QueryOptions::default(),
        )
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(updated["id"], role["id"]);
    assert_eq!(updated["name"], json!("renamed"));
    assert_eq!(updated["created_at"], role["created_at"]);

    let missing = service
        .update("Role", 404i64, record(json!({ "name": "x" })), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(missing, Records::One(None));
    let err = service
        .update("Role", 404i64, record(json!({ "name": "x" })), QueryOptions::required())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn destroy_by_criteria_removes_matches_only() {
    let service = setup_service().await;
    for name in ["destroytest", "keep"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }

    let n = service
        .destroy("Role", Criteria::new().where_eq("name", "destroytest"), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(n, 1);

    let left = service.find("Role", Criteria::new(), QueryOptions::default()).await.unwrap().many();
    assert_eq!(left.len(), 1);
    assert!(includes(&left[0], &json!({ "name": "keep" })));

    let none = service
        .destroy("Role", Criteria::new().where_eq("name", "absent"), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test]
async fn destroy_without_criteria_empties_the_table() {
    let service = setup_service().await;
    for name in ["a", "b", "c"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }
    let n = service.destroy("Role", Criteria::new(), QueryOptions::default()).await.unwrap();
    assert_eq!(n, 3);
    assert!(service.find("Role", Criteria::new(), QueryOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn destroy_by_id() {
    let service = setup_service().await;
    let role = service
        .create("Role", record(json!({ "name": "doomed" })), QueryOptions::default())
        .await
        .unwrap();

    let n = service
        .destroy("Role", IdOrCriteria::Id(role["id"].clone()), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(
        service.destroy("Role", IdOrCriteria::Id(role["id"].clone()), QueryOptions::default()).await.unwrap(),
        0
    );
    let err = service
        .destroy("Role", IdOrCriteria::Id(role["id"].clone()), QueryOptions::required())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn null_criteria_match_missing_values() {
    let service = setup_service().await;
    service
        .create("Post", record(json!({ "title": "orphan" })), QueryOptions::default())
        .await
        .unwrap();
    service
        .create("Post", record(json!({ "title": "owned", "user_id": 1 })), QueryOptions::default())
        .await
        .unwrap();

    let orphans = service
        .find("Post", Criteria::new().where_eq("user_id", Value::Null), QueryOptions::default())
        .await
        .unwrap()
        .many();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0]["title"], json!("orphan"));
}

#[tokio::test]
async fn uuid_models_generate_string_ids() {
    let service = setup_service().await;
    let tag = service
        .create("Tag", record(json!({ "label": "rust" })), QueryOptions::default())
        .await
        .unwrap();
    let id = tag["id"].as_str().expect("uuid id is a string");
    assert!(uuid::Uuid::parse_str(id).is_ok());

    let found = service.find("Tag", id, QueryOptions::required()).await.unwrap();
    assert_eq!(found.one(), Some(tag));
}

#[tokio::test]
async fn update_is_idempotent() {
    let service = setup_service().await;
    service
        .create("Role", record(json!({ "name": "first" })), QueryOptions::default())
        .await
        .unwrap();

    for _ in 0..2 {
        let updated = service
            .update(
                "Role",
                Criteria::new().where_eq("name", "first"),
                record(json!({ "name": "second" })),
                QueryOptions::default(),
            )
            .await
            .unwrap();
        // the second call matches nothing but still reports the row holding the new value
        assert_eq!(updated.len(), 1);
        assert_eq!(updated.many()[0]["name"], json!("second"));
    }
}

#[tokio::test]
async fn update_without_criteria_touches_every_row() {
    let service = setup_service().await;
    for name in ["a", "b", "c"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }

    let updated = service
        .update("Role", Criteria::new(), record(json!({ "name": "same" })), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(updated.len(), 3);

    let all = service.find("Role", Criteria::new(), QueryOptions::default()).await.unwrap().many();
    assert!(all.iter().all(|r| r["name"] == json!("same")));
}

#[tokio::test]
async fn malformed_criteria_never_reach_the_store() {
    let service = setup_service().await;
    for name in ["keep", "also", "more"] {
        service
            .create("Role", record(json!({ "name": name })), QueryOptions::default())
            .await
            .unwrap();
    }

    assert!(IdOrCriteria::from_json(json!({ "name": "keep" })).is_err());
    assert!(IdOrCriteria::from_json(json!({ "wher": { "name": "keep" } })).is_err());

    let scoped = IdOrCriteria::from_json(json!({ "where": { "name": "keep" } })).unwrap();
    assert_eq!(service.destroy("Role", scoped, QueryOptions::default()).await.unwrap(), 1);

    let left = service.find("Role", Criteria::new(), QueryOptions::default()).await.unwrap();
    assert_eq!(left.len(), 2);
}
