//! Shared fixtures: a simulation schema four levels deep.
//!
//! simulation (scope) <- simulation_wave <- simulation_circuit
//!   <- simulation_station <- simulation_substation

#![allow(dead_code)]

use serde_json::Value;

use batchwork_core::{EntityDescriptor, EntitySchema, FieldDef, FieldKind, FieldMap, Row};
use batchwork_storage::{Filter, SqliteStore, Store};
use batchwork_uow::UowConfig;

pub const MAIN_TABLE: &str = "simulation";

pub const MIGRATIONS: &[&str] = &[
    "CREATE TABLE simulation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        scheduledelimiters TEXT
    );
    CREATE TABLE simulation_wave (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        simulationid INTEGER NOT NULL,
        timecreated INTEGER NOT NULL
    );
    CREATE TABLE simulation_circuit (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        waveid INTEGER NOT NULL,
        timestart INTEGER,
        timeend INTEGER
    );",
    "CREATE TABLE simulation_station (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        circuitid INTEGER NOT NULL
    );
    CREATE TABLE simulation_substation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        stationid INTEGER NOT NULL,
        capacity INTEGER NOT NULL DEFAULT 1
    );",
];

pub fn wave() -> EntityDescriptor {
    EntityDescriptor::root(
        "simulation_wave",
        "sim::wave",
        EntitySchema::new("simulation_wave")
            .field(FieldDef::new("name", FieldKind::Text))
            .field(FieldDef::new("description", FieldKind::Text).nullable())
            .field(FieldDef::new("simulationid", FieldKind::Int))
            .field(FieldDef::new("timecreated", FieldKind::Int).default_now()),
    )
}

pub fn circuit() -> EntityDescriptor {
    EntityDescriptor::child(
        "simulation_circuit",
        "sim::circuit",
        "sim::wave",
        EntitySchema::new("simulation_circuit")
            .field(FieldDef::new("name", FieldKind::Text))
            .field(FieldDef::new("description", FieldKind::Text).nullable())
            .field(FieldDef::new("waveid", FieldKind::Int))
            .field(FieldDef::new("timestart", FieldKind::Int).nullable())
            .field(FieldDef::new("timeend", FieldKind::Int).nullable()),
    )
}

pub fn station() -> EntityDescriptor {
    EntityDescriptor::child(
        "simulation_station",
        "sim::station",
        "sim::circuit",
        EntitySchema::new("simulation_station")
            .field(FieldDef::new("name", FieldKind::Text))
            .field(FieldDef::new("circuitid", FieldKind::Int)),
    )
}

pub fn substation() -> EntityDescriptor {
    EntityDescriptor::child(
        "simulation_substation",
        "sim::substation",
        "sim::station",
        EntitySchema::new("simulation_substation")
            .field(FieldDef::new("name", FieldKind::Text))
            .field(FieldDef::new("stationid", FieldKind::Int))
            .field(FieldDef::new("capacity", FieldKind::Int).default_value(1)),
    )
}

/// All four types, deliberately listed children first.
pub fn classmap() -> Vec<EntityDescriptor> {
    vec![substation(), circuit(), station(), wave()]
}

pub fn config(simulation_id: i64) -> UowConfig {
    UowConfig::new(MAIN_TABLE, simulation_id).with_child_parent_id_column("simulationid")
}

pub fn store() -> SqliteStore {
    SqliteStore::with_migrations(None, MIGRATIONS).unwrap()
}

pub fn data(value: Value) -> FieldMap {
    serde_json::from_value(value).unwrap()
}

/// Inserts a row directly and returns its id.
pub fn insert(store: &mut dyn Store, table: &str, value: Value) -> i64 {
    let mut tx = store.begin().unwrap();
    let id = tx.insert_row(table, &data(value)).unwrap();
    tx.commit().unwrap();
    id
}

pub fn rows(store: &dyn Store, table: &str) -> Vec<Row> {
    store.fetch_rows(table, &Filter::all(), Some("id")).unwrap()
}

/// Ids of the seeded tree.
pub struct Seeded {
    pub simulation: i64,
    pub waves: Vec<i64>,
    pub circuits: Vec<i64>,
    pub stations: Vec<i64>,
    pub substations: Vec<i64>,
}

/// One simulation with two waves. The first wave has two circuits, the first
/// circuit has two stations and the first station has two substations. The
/// second wave has one circuit with one station. Ten entities in total.
pub fn seed_tree(store: &mut dyn Store) -> Seeded {
    let simulation = insert(store, "simulation", serde_json::json!({"name": "newsim"}));
    let waves = vec![
        insert(
            store,
            "simulation_wave",
            serde_json::json!({"name": "Vague 1", "simulationid": simulation, "timecreated": 1}),
        ),
        insert(
            store,
            "simulation_wave",
            serde_json::json!({"name": "Vague 2", "simulationid": simulation, "timecreated": 1}),
        ),
    ];
    let circuits = vec![
        insert(store, "simulation_circuit", serde_json::json!({"name": "Circuit 1", "waveid": waves[0]})),
        insert(store, "simulation_circuit", serde_json::json!({"name": "Circuit 2", "waveid": waves[0]})),
        insert(store, "simulation_circuit", serde_json::json!({"name": "Circuit 3", "waveid": waves[1]})),
    ];
    let stations = vec![
        insert(store, "simulation_station", serde_json::json!({"name": "Station 1", "circuitid": circuits[0]})),
        insert(store, "simulation_station", serde_json::json!({"name": "Station 2", "circuitid": circuits[0]})),
        insert(store, "simulation_station", serde_json::json!({"name": "Station 3", "circuitid": circuits[2]})),
    ];
    let substations = vec![
        insert(store, "simulation_substation", serde_json::json!({"name": "Sub 1", "stationid": stations[0]})),
        insert(store, "simulation_substation", serde_json::json!({"name": "Sub 2", "stationid": stations[0]})),
    ];
    Seeded {
        simulation,
        waves,
        circuits,
        stations,
        substations,
    }
}
