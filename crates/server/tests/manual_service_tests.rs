//! Lifecycle service tests: ownership, ordering, cascades and rollbacks.

mod common;

use common::fixtures::{
    append_step, create_manual, manual_input, pairs, png_bytes, png_upload, register_user,
    step_orders, upload_png,
};
use common::{FaultyBlobStore, TestServer};
use guideforge_core::{PageRequest, StepOrder};
use guideforge_server::services::{ErrorKind, ServiceError, StepInput, Upload};
use guideforge_storage::BlobStore;
use std::sync::Arc;

#[tokio::test]
async fn test_non_owner_cannot_mutate_anything_under_a_manual() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let other = register_user(state, "other").await;

    let manual = create_manual(state, owner.principal, "Owned manual").await;
    let step = append_step(state, owner.principal, manual.id, "First").await;
    let image = upload_png(state, owner.principal, step.id, "a.png").await;
    let p = other.principal;

    let failures = vec![
        state
            .manuals
            .update_manual(manual.id, p, manual_input("Hijacked", true))
            .await
            .map(|_| ()),
        state
            .manuals
            .create_step(
                manual.id,
                p,
                StepInput {
                    title: "Intruder".into(),
                    content: String::new(),
                },
                None,
            )
            .await
            .map(|_| ()),
        state
            .manuals
            .update_step(
                step.id,
                p,
                StepInput {
                    title: "Intruder".into(),
                    content: String::new(),
                },
            )
            .await
            .map(|_| ()),
        state
            .manuals
            .update_step_order(manual.id, p, &[StepOrder::new(step.id, 0)])
            .await
            .map(|_| ()),
        state
            .manuals
            .upload_image(step.id, p, png_upload("b.png"))
            .await
            .map(|_| ()),
        state.manuals.delete_image(image.id, p).await,
        state.manuals.delete_step(step.id, p).await.map(|_| ()),
        state.manuals.delete_manual(manual.id, p).await.map(|_| ()),
    ];

    for (i, result) in failures.into_iter().enumerate() {
        let err = result.expect_err("non-owner mutation should fail");
        assert_eq!(err.kind(), ErrorKind::Unauthorized, "operation {i}: {err}");
    }

    // Nothing changed.
    let detail = state.manuals.get_manual(manual.id, owner.principal).await.unwrap();
    assert_eq!(detail.manual.title, "Owned manual");
    assert_eq!(detail.steps.len(), 1);
    assert_eq!(detail.steps[0].images.len(), 1);
    assert!(server.blob_exists(&image.file_path));
}

#[tokio::test]
async fn test_private_manual_is_hidden_and_public_manual_is_readable() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let reader = register_user(state, "reader").await;

    let manual = create_manual(state, owner.principal, "Private guide").await;
    append_step(state, owner.principal, manual.id, "Only step").await;

    let err = state
        .manuals
        .get_manual(manual.id, reader.principal)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    state
        .manuals
        .update_manual(manual.id, owner.principal, manual_input("Private guide", true))
        .await
        .unwrap();

    let as_owner = state.manuals.get_manual(manual.id, owner.principal).await.unwrap();
    let as_reader = state.manuals.get_manual(manual.id, reader.principal).await.unwrap();
    assert_eq!(as_owner.manual.id, as_reader.manual.id);
    assert_eq!(as_owner.manual.title, as_reader.manual.title);
    let steps = |d: &guideforge_server::services::ManualDetail| {
        d.steps
            .iter()
            .map(|s| (s.step.id, s.step.order_number))
            .collect::<Vec<_>>()
    };
    assert_eq!(steps(&as_owner), steps(&as_reader));

    let listed = state
        .manuals
        .list_steps(manual.id, reader.principal)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_order_stays_contiguous_under_appends_and_deletes() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Ordering").await;

    let mut ids = Vec::new();
    for title in ["step0", "step1", "step2", "step3", "step4", "step5"] {
        ids.push(append_step(state, owner.principal, manual.id, title).await.id);
    }
    // Delete from the middle, the front and the back, appending in between.
    for id in [ids[2], ids[0]] {
        state.manuals.delete_step(id, owner.principal).await.unwrap();
    }
    append_step(state, owner.principal, manual.id, "step6").await;
    state.manuals.delete_step(ids[5], owner.principal).await.unwrap();

    let orders: Vec<i32> = step_orders(state, manual.id)
        .await
        .into_iter()
        .map(|(_, order)| order)
        .collect();
    let expected: Vec<i32> = (0..orders.len() as i32).collect();
    assert_eq!(orders, expected);
    assert_eq!(
        step_orders(state, manual.id).await,
        pairs(&[("step1", 0), ("step3", 1), ("step4", 2), ("step6", 3)])
    );
}

#[tokio::test]
async fn test_deleting_second_step_compacts_the_rest() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Compaction").await;

    let a = append_step(state, owner.principal, manual.id, "Alpha").await;
    let b = append_step(state, owner.principal, manual.id, "Bravo").await;
    let c = append_step(state, owner.principal, manual.id, "Charlie").await;
    let d = append_step(state, owner.principal, manual.id, "Delta").await;
    assert_eq!(
        [a.order_number, b.order_number, c.order_number, d.order_number],
        [0, 1, 2, 3]
    );

    state.manuals.delete_step(b.id, owner.principal).await.unwrap();

    assert_eq!(
        step_orders(state, manual.id).await,
        pairs(&[("Alpha", 0), ("Charlie", 1), ("Delta", 2)])
    );
}

#[tokio::test]
async fn test_explicit_position_insert_shifts_and_rejects_out_of_range() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Positions").await;
    append_step(state, owner.principal, manual.id, "Alpha").await;
    append_step(state, owner.principal, manual.id, "Bravo").await;

    let input = |title: &str| StepInput {
        title: title.to_string(),
        content: String::new(),
    };
    state
        .manuals
        .create_step(manual.id, owner.principal, input("Mid"), Some(1))
        .await
        .unwrap();
    assert_eq!(
        step_orders(state, manual.id).await,
        pairs(&[("Alpha", 0), ("Mid", 1), ("Bravo", 2)])
    );

    let err = state
        .manuals
        .create_step(manual.id, owner.principal, input("Far"), Some(7))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(step_orders(state, manual.id).await.len(), 3);
}

#[tokio::test]
async fn test_reorder_with_foreign_step_is_atomic_and_names_the_step() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Target").await;
    let other_manual = create_manual(state, owner.principal, "Elsewhere").await;

    let a = append_step(state, owner.principal, manual.id, "Alpha").await;
    let b = append_step(state, owner.principal, manual.id, "Bravo").await;
    let c = append_step(state, owner.principal, manual.id, "Charlie").await;
    let stranger = append_step(state, owner.principal, other_manual.id, "Xray").await;

    let err = state
        .manuals
        .update_step_order(
            manual.id,
            owner.principal,
            &[
                StepOrder::new(a.id, 2),
                StepOrder::new(b.id, 1),
                StepOrder::new(stranger.id, 0),
            ],
        )
        .await
        .unwrap_err();
    match err {
        ServiceError::ForeignStep { step_id, manual_id } => {
            assert_eq!(step_id, stranger.id);
            assert_eq!(manual_id, manual.id);
        }
        other => panic!("expected ForeignStep, got {other:?}"),
    }
    assert_eq!(
        step_orders(state, manual.id).await,
        pairs(&[("Alpha", 0), ("Bravo", 1), ("Charlie", 2)])
    );

    let reordered = state
        .manuals
        .update_step_order(
            manual.id,
            owner.principal,
            &[
                StepOrder::new(a.id, 2),
                StepOrder::new(b.id, 0),
                StepOrder::new(c.id, 1),
            ],
        )
        .await
        .unwrap();
    let titles: Vec<&str> = reordered.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Bravo", "Charlie", "Alpha"]);
}

#[tokio::test]
async fn test_reorder_rejects_duplicates_and_gaps() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Strict").await;
    let a = append_step(state, owner.principal, manual.id, "Alpha").await;
    let b = append_step(state, owner.principal, manual.id, "Bravo").await;

    for request in [
        vec![StepOrder::new(a.id, 0), StepOrder::new(b.id, 0)],
        vec![StepOrder::new(a.id, 0), StepOrder::new(b.id, 5)],
        vec![StepOrder::new(a.id, 1), StepOrder::new(a.id, 0)],
        vec![],
    ] {
        let err = state
            .manuals
            .update_step_order(manual.id, owner.principal, &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{request:?}");
    }
    assert_eq!(
        step_orders(state, manual.id).await,
        pairs(&[("Alpha", 0), ("Bravo", 1)])
    );
}

#[tokio::test]
async fn test_upload_blob_is_removed_when_row_insert_fails() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Rollback").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;

    sqlx::query("DROP TABLE images")
        .execute(server.sqlite.pool())
        .await
        .unwrap();

    let err = state
        .manuals
        .upload_image(step.id, owner.principal, png_upload("photo.png"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);

    let key = guideforge_core::paths::step_image_key(manual.id, step.id, "photo.png");
    assert!(!server.blob_exists(&key), "blob {key} should have been rolled back");
}

#[tokio::test]
async fn test_upload_validation_and_conflict() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Uploads").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;

    let image = upload_png(state, owner.principal, step.id, "../../etc/photo.png").await;
    assert_eq!(image.file_name, "photo.png");
    assert_eq!(
        image.file_path,
        format!("steps/manual_{}/step_{}/image_photo.png", manual.id, step.id)
    );
    assert_eq!(image.file_size, png_bytes().len() as i64);

    let err = state
        .manuals
        .upload_image(step.id, owner.principal, png_upload("photo.png"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let empty = Upload {
        file_name: "empty.png".into(),
        mime_type: None,
        data: bytes::Bytes::new(),
    };
    let err = state
        .manuals
        .upload_image(step.id, owner.principal, empty)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_oversize_upload_is_rejected() {
    let server = TestServer::with_config(|config| config.upload.max_upload_size = 8).await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Small files").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;

    let err = state
        .manuals
        .upload_image(step.id, owner.principal, png_upload("big.png"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_manual_cascade_survives_a_failing_blob_delete() {
    let mut faulty = None;
    let server = TestServer::with_blob_store(|inner| {
        let store = Arc::new(FaultyBlobStore::new(inner));
        faulty = Some(store.clone());
        store as Arc<dyn BlobStore>
    })
    .await;
    let faulty = faulty.unwrap();
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Cascade").await;

    let s1 = append_step(state, owner.principal, manual.id, "One").await;
    let s2 = append_step(state, owner.principal, manual.id, "Two").await;
    let i1 = upload_png(state, owner.principal, s1.id, "one.png").await;
    let i2 = upload_png(state, owner.principal, s2.id, "two.png").await;
    faulty.fail_delete(&i1.file_path);

    let stats = state
        .manuals
        .delete_manual(manual.id, owner.principal)
        .await
        .unwrap();
    assert_eq!((stats.steps, stats.images), (2, 2));

    let mut attempts = faulty.delete_attempts();
    attempts.sort();
    let mut expected = vec![i1.file_path.clone(), i2.file_path.clone()];
    expected.sort();
    assert_eq!(attempts, expected);

    let metadata = server.metadata();
    assert!(metadata.get_manual(manual.id).await.unwrap().is_none());
    assert!(metadata.get_step(s1.id).await.unwrap().is_none());
    assert!(metadata.get_step(s2.id).await.unwrap().is_none());
    assert!(metadata.get_image(i1.id).await.unwrap().is_none());
    assert!(metadata.get_image(i2.id).await.unwrap().is_none());
    assert!(server.blob_exists(&i1.file_path));
    assert!(!server.blob_exists(&i2.file_path));
}

#[tokio::test]
async fn test_delete_image_keeps_row_when_blob_delete_fails() {
    let mut faulty = None;
    let server = TestServer::with_blob_store(|inner| {
        let store = Arc::new(FaultyBlobStore::new(inner));
        faulty = Some(store.clone());
        store as Arc<dyn BlobStore>
    })
    .await;
    let faulty = faulty.unwrap();
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Images").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;
    let image = upload_png(state, owner.principal, step.id, "a.png").await;

    faulty.fail_delete(&image.file_path);
    let err = state
        .manuals
        .delete_image(image.id, owner.principal)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert!(server.metadata().get_image(image.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_image_tolerates_missing_blob() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Images").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;
    let image = upload_png(state, owner.principal, step.id, "a.png").await;

    std::fs::remove_file(server.storage_root.join(&image.file_path)).unwrap();
    state
        .manuals
        .delete_image(image.id, owner.principal)
        .await
        .unwrap();
    assert!(server.metadata().get_image(image.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleting_twice_is_not_found() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Twice").await;
    let step = append_step(state, owner.principal, manual.id, "Step").await;
    let kept = append_step(state, owner.principal, manual.id, "Kept").await;
    let image = upload_png(state, owner.principal, kept.id, "a.png").await;

    state.manuals.delete_image(image.id, owner.principal).await.unwrap();
    let err = state
        .manuals
        .delete_image(image.id, owner.principal)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    state.manuals.delete_step(step.id, owner.principal).await.unwrap();
    let err = state
        .manuals
        .delete_step(step.id, owner.principal)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    state.manuals.delete_manual(manual.id, owner.principal).await.unwrap();
    let err = state
        .manuals
        .delete_manual(manual.id, owner.principal)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_image_content_follows_read_rule() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let reader = register_user(state, "reader").await;
    let manual = create_manual(state, owner.principal, "Pictures").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;
    let image = upload_png(state, owner.principal, step.id, "a.png").await;

    let (row, data) = state
        .manuals
        .get_image_content(image.id, owner.principal)
        .await
        .unwrap();
    assert_eq!(row.mime_type, "image/png");
    assert_eq!(data, png_bytes());

    let err = state
        .manuals
        .get_image_content(image.id, reader.principal)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_listings_are_paginated() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let other = register_user(state, "other").await;

    for i in 0..5 {
        state
            .manuals
            .create_manual(owner.principal, manual_input(&format!("Manual {i}"), i % 2 == 0))
            .await
            .unwrap();
    }
    create_manual(state, other.principal, "Not mine").await;

    let page = state
        .manuals
        .list_my_manuals(owner.principal, PageRequest::normalize(Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 5);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|m| m.user_id == owner.principal.id()));

    let public = state
        .manuals
        .list_public_manuals(PageRequest::default())
        .await
        .unwrap();
    assert_eq!(public.pagination.total, 3);
    assert!(public.items.iter().all(|m| m.is_public));
}

#[tokio::test]
async fn test_delete_account_removes_owned_manuals_and_blobs() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Going away").await;
    let step = append_step(state, owner.principal, manual.id, "Only").await;
    let image = upload_png(state, owner.principal, step.id, "a.png").await;

    let profile = state
        .users
        .update_profile_image(owner.principal, png_upload("Me.PNG"))
        .await
        .unwrap();
    let profile_key = profile.profile_image.clone().unwrap();
    assert_eq!(profile_key, format!("profiles/user_{}.png", owner.principal.id()));
    assert!(server.blob_exists(&profile_key));

    state.users.delete_account(owner.principal).await.unwrap();

    let metadata = server.metadata();
    assert!(metadata.get_user(owner.principal.id()).await.unwrap().is_none());
    assert!(metadata.get_manual(manual.id).await.unwrap().is_none());
    assert!(!server.blob_exists(&image.file_path));
    assert!(!server.blob_exists(&profile_key));

    let err = state.users.get_profile(owner.principal).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_deleted_account_cannot_create_manuals() {
    let server = TestServer::new().await;
    let state = &server.state;
    let ghost = register_user(state, "ghost").await;
    state.users.delete_account(ghost.principal).await.unwrap();

    let err = state
        .manuals
        .create_manual(ghost.principal, manual_input("After deletion", false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");
    assert_eq!(err.detail(), format!("user {}", ghost.principal.id()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes_and_appends_keep_order_contiguous() {
    let server = TestServer::new().await;
    let state = &server.state;
    let owner = register_user(state, "owner").await;
    let manual = create_manual(state, owner.principal, "Busy manual").await;

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(
            append_step(state, owner.principal, manual.id, &format!("step{i}"))
                .await
                .id,
        );
    }

    let mut tasks = Vec::new();
    for (i, step_id) in ids.iter().copied().step_by(2).enumerate() {
        let manuals = state.manuals.clone();
        let principal = owner.principal;
        tasks.push(tokio::spawn(async move {
            manuals.delete_step(step_id, principal).await.map(|_| ())
        }));

        let manuals = state.manuals.clone();
        let manual_id = manual.id;
        tasks.push(tokio::spawn(async move {
            manuals
                .create_step(
                    manual_id,
                    principal,
                    StepInput {
                        title: format!("late{i}"),
                        content: String::new(),
                    },
                    None,
                )
                .await
                .map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let orders: Vec<i32> = step_orders(state, manual.id)
        .await
        .into_iter()
        .map(|(_, order)| order)
        .collect();
    assert_eq!(orders, (0..10).collect::<Vec<i32>>());
}
