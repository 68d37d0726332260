//! End-to-end tests of the graph persistence subsystem.
//!
//! Everything runs against the in-memory store, which implements the
//! server-side transaction contract: per target state it upserts vertices,
//! deletes the stale edges, and inserts the newly computed edges
//! atomically. The tests map documents to models, mutate relations, save
//! through a transaction, and traverse the result back out.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::json;

use graph_mapper::document::{Document, FROM_FIELD, HASH_KEY_FIELD, TO_FIELD};
use graph_mapper::model::{Model, RelationValue};
use graph_mapper::store::mem::MemStore;
use graph_mapper::test_utils::{
    blog_context, blog_context_with_config, garage_context, garage_context_with_config,
    script_config, seed_authorship, seed_car, seed_garage, seed_parking, seed_post, seed_user,
    CAR, GARAGE, POST, USER,
};
use graph_mapper::{GraphContext, ModelRef, Transaction};

fn load_user(ctx: &GraphContext, store: &MemStore, key: &str) -> ModelRef {
    let document = store.document("users", key).expect("user not seeded");
    ctx.collection_for(USER)
        .unwrap()
        .mapper()
        .document_to_model(ctx, &document)
        .unwrap()
}

#[test]
fn lazy_relation_resolves_through_the_store() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");
    seed_post(&store, "p1", "first");
    seed_post(&store, "p2", "second");
    seed_authorship(&store, "e1", "u1", "p1", Document::new());
    seed_authorship(&store, "e2", "u1", "p2", Document::new());

    let ctx = blog_context(store.clone());
    let user = load_user(&ctx, &store, "u1");

    let posts = match user.borrow().relation("posts") {
        Some(RelationValue::Proxy(proxy)) => {
            assert!(!proxy.is_resolved());
            let posts = proxy.to_vec(&ctx).unwrap();
            assert!(proxy.is_resolved());
            posts
        }
        other => panic!("expected a proxy, got {other:?}"),
    };

    let titles: Vec<String> = posts
        .iter()
        .map(|post| {
            post.borrow()
                .attribute("title")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap()
        })
        .collect();
    assert_eq!(titles, vec!["first", "second"]);
}

#[test]
fn inverse_relation_traverses_inbound() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");
    seed_post(&store, "p1", "first");
    seed_authorship(&store, "e1", "u1", "p1", Document::new());

    let ctx = blog_context(store.clone());
    let document = store.document("posts", "p1").unwrap();
    let post = ctx
        .collection_for(POST)
        .unwrap()
        .mapper()
        .document_to_model(&ctx, &document)
        .unwrap();

    let author = match post.borrow().relation("author") {
        Some(RelationValue::Proxy(proxy)) => proxy.get(&ctx).unwrap(),
        other => panic!("expected a proxy, got {other:?}"),
    };
    assert_eq!(author.unwrap().borrow().key(), Some("u1"));
}

#[test]
fn cyclic_relations_map_without_recursion() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");
    seed_post(&store, "p1", "first");
    seed_authorship(&store, "e1", "u1", "p1", Document::new());

    let ctx = blog_context(store.clone());
    let user = load_user(&ctx, &store, "u1");

    // user -> posts -> p1 -> author -> the identical user instance.
    let posts = match user.borrow().relation("posts") {
        Some(RelationValue::Proxy(proxy)) => proxy.to_vec(&ctx).unwrap(),
        other => panic!("expected a proxy, got {other:?}"),
    };
    let author = match posts[0].borrow().relation("author") {
        Some(RelationValue::Proxy(proxy)) => proxy.get(&ctx).unwrap().unwrap(),
        other => panic!("expected a proxy, got {other:?}"),
    };

    assert!(Rc::ptr_eq(&user, &author));
}

#[test]
fn keyed_relation_recovers_map_keys() {
    let store = Rc::new(MemStore::new());
    seed_garage(&store, "g1", "Springfield");
    seed_car(&store, "c1", "R-1");
    seed_car(&store, "c2", "B-1");
    seed_parking(&store, "e1", "g1", "c1", "red");
    seed_parking(&store, "e2", "g1", "c2", "blue");

    let ctx = garage_context(store.clone());
    let document = store.document("garages", "g1").unwrap();
    let garage = ctx
        .collection_for(GARAGE)
        .unwrap()
        .mapper()
        .document_to_model(&ctx, &document)
        .unwrap();

    let guard = garage.borrow();
    let proxy = match guard.relation("cars") {
        Some(RelationValue::Proxy(proxy)) => proxy,
        other => panic!("expected a proxy, got {other:?}"),
    };

    let red = proxy.get_key(&ctx, "red").unwrap().unwrap();
    assert_eq!(red.borrow().key(), Some("c1"));

    let entries = proxy.entries(&ctx).unwrap();
    let slots: Vec<&str> = entries.iter().map(|(slot, _)| slot.as_str()).collect();
    assert_eq!(slots, vec!["blue", "red"]);
}

#[test]
fn saving_a_relation_replaces_the_old_edge_set() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");
    seed_post(&store, "p1", "old");
    seed_authorship(&store, "stale", "u1", "p1", Document::new());

    let (config, _script) = script_config();
    let ctx = blog_context_with_config(store.clone(), config);
    let users = ctx.collection_for(USER).unwrap();

    let user = load_user(&ctx, &store, "u1");
    let mut fresh = Model::new(POST);
    fresh.set_attribute("title", "brand new");
    user.borrow_mut()
        .set_relation("posts", RelationValue::list(vec![fresh.into_ref()]));

    let result = Transaction::run(&ctx, users, user).unwrap();
    assert_eq!(result["removedEdges"], json!(1));
    assert_eq!(result["edges"], json!(1));

    // The stale edge is gone; the remaining edge points from the user to
    // the newly created post.
    assert!(store.document("authorships", "stale").is_none());
    let edges = store.documents("authorships");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].get_str(FROM_FIELD), Some("users/u1"));

    let new_post_id = edges[0].get_str(TO_FIELD).unwrap();
    assert!(new_post_id.starts_with("posts/"));
    let (_, new_key) = graph_mapper::document::split_graph_id(new_post_id).unwrap();
    let stored = store.document("posts", new_key).unwrap();
    assert_eq!(stored.get_str("title"), Some("brand new"));
}

#[test]
fn saved_keyed_relation_traverses_back_with_hash_keys() {
    let store = Rc::new(MemStore::new());
    seed_garage(&store, "g1", "Springfield");

    let (config, _script) = script_config();
    let ctx = garage_context_with_config(store.clone(), config);
    let garages = ctx.collection_for(GARAGE).unwrap();

    let document = store.document("garages", "g1").unwrap();
    let garage = ctx
        .collection_for(GARAGE)
        .unwrap()
        .mapper()
        .document_to_model(&ctx, &document)
        .unwrap();

    let mut cars = BTreeMap::new();
    let mut red_car = Model::new(CAR);
    red_car.set_attribute("plate", "R-1");
    cars.insert("red".to_string(), red_car.into_ref());
    let mut blue_car = Model::new(CAR);
    blue_car.set_attribute("plate", "B-1");
    cars.insert("blue".to_string(), blue_car.into_ref());
    garage
        .borrow_mut()
        .set_relation("cars", RelationValue::map(cars));

    Transaction::run(&ctx, garages, garage).unwrap();

    // Each stored edge carries its slot as hash_key.
    let edges = store.documents("parkings");
    assert_eq!(edges.len(), 2);
    let mut slots: Vec<&str> = edges
        .iter()
        .filter_map(|edge| edge.get_str(HASH_KEY_FIELD))
        .collect();
    slots.sort_unstable();
    assert_eq!(slots, vec!["blue", "red"]);

    // A fresh unit of work resolves the keyed relation end to end.
    let second_ctx = garage_context(store.clone());
    let document = store.document("garages", "g1").unwrap();
    let reloaded = second_ctx
        .collection_for(GARAGE)
        .unwrap()
        .mapper()
        .document_to_model(&second_ctx, &document)
        .unwrap();
    let guard = reloaded.borrow();
    let proxy = match guard.relation("cars") {
        Some(RelationValue::Proxy(proxy)) => proxy,
        other => panic!("expected a proxy, got {other:?}"),
    };
    let red = proxy.get_key(&second_ctx, "red").unwrap().unwrap();
    assert_eq!(
        red.borrow().attribute("plate"),
        Some(&json!("R-1"))
    );
}

#[test]
fn vertex_only_save_upserts_the_document() {
    let store = Rc::new(MemStore::new());
    let (config, _script) = script_config();
    let ctx = garage_context_with_config(store.clone(), config);
    let cars = ctx.collection_for(CAR).unwrap();

    let mut car = Model::new(CAR);
    car.set_key("c9");
    car.set_attribute("plate", "X-999");

    let result = Transaction::run(&ctx, cars, car.into_ref()).unwrap();
    assert_eq!(result["vertices"], json!(1));
    assert_eq!(result["edges"], json!(0));

    let stored = store.document("cars", "c9").unwrap();
    assert_eq!(stored.get_str("plate"), Some("X-999"));
}

#[test]
fn submitted_request_declares_symmetric_collection_sets() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");

    let (config, _script) = script_config();
    let ctx = blog_context_with_config(store.clone(), config);
    let users = ctx.collection_for(USER).unwrap();

    let user = load_user(&ctx, &store, "u1");
    let mut post = Model::new(POST);
    post.set_attribute("title", "fresh");
    user.borrow_mut()
        .set_relation("posts", RelationValue::list(vec![post.into_ref()]));

    Transaction::run(&ctx, users, user).unwrap();

    let executed = store.executed_transactions();
    assert_eq!(executed.len(), 1);
    let request = &executed[0];

    assert_eq!(request.write, vec!["authorships", "users", "posts"]);
    assert_eq!(request.read, request.write);
    assert!(request.wait_for_sync);
    assert_eq!(request.params["graph"], json!("test_graph"));
    assert_eq!(request.params["logLevel"], json!("debug"));
    assert!(request.code.contains("function"));
}

#[test]
fn write_collections_deduplicate_across_states() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");
    seed_post(&store, "p1", "first");

    // A context whose user mapper declares two relations sharing the same
    // vertex and edge collections.
    let users_mapper = graph_mapper::Mapper::new(USER)
        .attribute("name", graph_mapper::AttributeShape::Scalar)
        .relation(
            "posts",
            graph_mapper::AttributeShape::List,
            graph_mapper::test_utils::AUTHORSHIP,
        )
        .relation(
            "drafts",
            graph_mapper::AttributeShape::List,
            graph_mapper::test_utils::AUTHORSHIP,
        );
    let ctx = GraphContext::builder(store.clone(), graph_mapper::test_utils::test_config())
        .collection("users", users_mapper)
        .collection("posts", graph_mapper::test_utils::posts_mapper())
        .edge_type(graph_mapper::test_utils::AUTHORSHIP)
        .build();
    let users = ctx.collection_for(USER).unwrap();

    let user = load_user(&ctx, &store, "u1");
    let mut a = Model::new(POST);
    a.set_attribute("title", "a");
    let mut b = Model::new(POST);
    b.set_attribute("title", "b");
    user.borrow_mut()
        .set_relation("posts", RelationValue::list(vec![a.into_ref()]));
    user.borrow_mut()
        .set_relation("drafts", RelationValue::list(vec![b.into_ref()]));

    let transaction = Transaction::new(&ctx, users, user).unwrap();
    assert_eq!(transaction.target_states().len(), 2);
    assert_eq!(
        transaction.write_collections(),
        vec!["authorships", "users", "posts"]
    );
}

#[test]
fn untouched_lazy_relation_round_trips_on_save() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");
    seed_post(&store, "p1", "kept");
    seed_authorship(&store, "e1", "u1", "p1", Document::new());

    let (config, _script) = script_config();
    let ctx = blog_context_with_config(store.clone(), config);
    let users = ctx.collection_for(USER).unwrap();

    // Saving without touching the relation materializes the proxy and
    // rewrites the same edge set.
    let user = load_user(&ctx, &store, "u1");
    Transaction::run(&ctx, users, user).unwrap();

    let edges = store.documents("authorships");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].get_str(FROM_FIELD), Some("users/u1"));
    assert_eq!(edges[0].get_str(TO_FIELD), Some("posts/p1"));
}

#[test]
fn identity_map_is_scoped_to_one_unit_of_work() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");

    let first_ctx = blog_context(store.clone());
    let second_ctx = blog_context(store.clone());

    let in_first = load_user(&first_ctx, &store, "u1");
    let in_first_again = load_user(&first_ctx, &store, "u1");
    let in_second = load_user(&second_ctx, &store, "u1");

    assert!(Rc::ptr_eq(&in_first, &in_first_again));
    assert!(!Rc::ptr_eq(&in_first, &in_second));
}

#[test]
fn failed_resolution_is_not_cached() {
    let store = Rc::new(MemStore::new());
    seed_user(&store, "u1", "Lisa");

    // A context that never declared the graph's edge definition cannot
    // traverse; the proxy surfaces the error and stays unresolved.
    let ctx = blog_context(store.clone());
    let user = load_user(&ctx, &store, "u1");

    // Sabotage: a second store without definitions would be cleaner, but
    // an unknown edge type on a separate context does the same job.
    let bare_ctx = GraphContext::builder(store.clone(), graph_mapper::test_utils::test_config())
        .collection("users", graph_mapper::test_utils::users_mapper())
        .collection("posts", graph_mapper::test_utils::posts_mapper())
        .build();

    let guard = user.borrow();
    let proxy = match guard.relation("posts") {
        Some(RelationValue::Proxy(proxy)) => proxy,
        other => panic!("expected a proxy, got {other:?}"),
    };

    assert!(proxy.to_vec(&bare_ctx).is_err());
    assert!(!proxy.is_resolved());

    // Resolving through the properly configured context still works.
    assert!(proxy.to_vec(&ctx).is_ok());
    assert!(proxy.is_resolved());
}
