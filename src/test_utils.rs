//! Shared fixtures for unit and integration tests.
//!
//! Two small domains cover every relation shape: a blog (users writing
//! posts through `authorships`, with the inverse `author` relation) and a
//! garage (cars keyed by slot through `parkings`).

use std::rc::Rc;

use crate::config::Config;
use crate::context::GraphContext;
use crate::document::Document;
use crate::edge_collection::EdgeType;
use crate::mapper::{AttributeShape, Mapper};
use crate::model::ModelType;
use crate::store::mem::MemStore;

pub const USER: ModelType = ModelType("User");
pub const POST: ModelType = ModelType("Post");
pub const GARAGE: ModelType = ModelType("Garage");
pub const CAR: ModelType = ModelType("Car");

pub const AUTHORSHIP: EdgeType = EdgeType::new("Authorship", USER, POST);
pub const PARKING: EdgeType = EdgeType::new("Parking", GARAGE, CAR);

pub fn users_mapper() -> Mapper {
    Mapper::new(USER)
        .attribute("name", AttributeShape::Scalar)
        .relation("posts", AttributeShape::List, AUTHORSHIP)
}

pub fn posts_mapper() -> Mapper {
    Mapper::new(POST)
        .attribute("title", AttributeShape::Scalar)
        .inverse_relation("author", AttributeShape::Scalar, AUTHORSHIP)
}

pub fn garages_mapper() -> Mapper {
    Mapper::new(GARAGE)
        .attribute("city", AttributeShape::Scalar)
        .relation("cars", AttributeShape::Map, PARKING)
}

pub fn cars_mapper() -> Mapper {
    Mapper::new(CAR).attribute("plate", AttributeShape::Scalar)
}

/// A configuration pointing at a script path that is never read. Use
/// [`script_config`] for tests that execute transactions.
pub fn test_config() -> Config {
    Config::new("test_graph", "transaction.js")
}

/// A configuration whose transaction script actually exists on disk. The
/// returned file guard must outlive the configuration's use.
pub fn script_config() -> (Config, tempfile::NamedTempFile) {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp script");
    write!(file, "function (params) {{ return params; }}").expect("failed to write temp script");
    let config = Config::new("test_graph", file.path());
    (config, file)
}

/// A unit of work over the blog domain (users, posts, authorships).
pub fn blog_context(store: Rc<MemStore>) -> GraphContext {
    blog_context_with_config(store, test_config())
}

pub fn blog_context_with_config(store: Rc<MemStore>, config: Config) -> GraphContext {
    GraphContext::builder(store, config)
        .collection("users", users_mapper())
        .collection("posts", posts_mapper())
        .edge_type(AUTHORSHIP)
        .build()
}

/// A unit of work over the garage domain (garages, cars, parkings).
pub fn garage_context(store: Rc<MemStore>) -> GraphContext {
    garage_context_with_config(store, test_config())
}

pub fn garage_context_with_config(store: Rc<MemStore>, config: Config) -> GraphContext {
    GraphContext::builder(store, config)
        .collection("garages", garages_mapper())
        .collection("cars", cars_mapper())
        .edge_type(PARKING)
        .build()
}

pub fn seed_user(store: &MemStore, key: &str, name: &str) {
    let mut document = Document::new();
    document.insert("name", name);
    store.insert_document("users", key, document);
}

pub fn seed_post(store: &MemStore, key: &str, title: &str) {
    let mut document = Document::new();
    document.insert("title", title);
    store.insert_document("posts", key, document);
}

pub fn seed_authorship(
    store: &MemStore,
    key: &str,
    user_key: &str,
    post_key: &str,
    attributes: Document,
) {
    store.insert_edge(
        "authorships",
        key,
        &format!("users/{user_key}"),
        &format!("posts/{post_key}"),
        attributes,
    );
}

pub fn seed_garage(store: &MemStore, key: &str, city: &str) {
    let mut document = Document::new();
    document.insert("city", city);
    store.insert_document("garages", key, document);
}

pub fn seed_car(store: &MemStore, key: &str, plate: &str) {
    let mut document = Document::new();
    document.insert("plate", plate);
    store.insert_document("cars", key, document);
}

pub fn seed_parking(store: &MemStore, key: &str, garage_key: &str, car_key: &str, slot: &str) {
    let mut attributes = Document::new();
    attributes.insert(crate::document::HASH_KEY_FIELD, slot);
    store.insert_edge(
        "parkings",
        key,
        &format!("garages/{garage_key}"),
        &format!("cars/{car_key}"),
        attributes,
    );
}
