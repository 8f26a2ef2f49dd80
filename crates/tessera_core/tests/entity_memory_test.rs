//! Integration test for chunked entity memory.

use std::collections::HashSet;

use tessera_core::ecs::CHUNK_MEMORY_TAG;
use tessera_core::{
    EcsError, Entity, EntityConfig, EntityContainer, EntityManager, EntityTypeId, GlobalMemory,
};

#[derive(Debug, PartialEq)]
struct Asteroid {
    mass: u32,
}

impl Entity for Asteroid {
    const TYPE_ID: EntityTypeId = 0;
}

#[derive(Debug)]
struct Beacon;

impl Entity for Beacon {
    const TYPE_ID: EntityTypeId = 1;
}

#[test]
fn test_live_slots_are_unique_and_inside_one_chunk() {
    let mut container = EntityContainer::<Asteroid>::new(16, GlobalMemory::shared(1024 * 1024));

    let mut slots: Vec<_> = (0..100)
        .map(|mass| container.create_entity(Asteroid { mass }).unwrap())
        .collect();
    for slot in slots.drain(..40).step_by(3) {
        container.destroy_entity(slot).unwrap();
    }
    slots.extend((0..25).map(|mass| container.create_entity(Asteroid { mass }).unwrap()));

    let live: Vec<_> = slots
        .iter()
        .copied()
        .filter(|s| container.get(*s).is_some())
        .collect();
    let unique: HashSet<_> = live.iter().copied().collect();
    assert_eq!(unique.len(), live.len());

    let ranges: Vec<_> = container.chunk_ranges().collect();
    for slot in live {
        let owners = ranges.iter().filter(|r| r.contains(&slot.address())).count();
        assert_eq!(owners, 1, "slot {slot:?} owned by {owners} chunks");
    }
}

#[test]
fn test_create_lookup_destroy_reissue() {
    let mut entities = EntityManager::new(&EntityConfig::default(), GlobalMemory::shared(1024 * 1024));

    let asteroid = entities.create_entity(Asteroid { mass: 12 }).unwrap();
    let beacon = entities.create_entity(Beacon).unwrap();

    assert!(entities.get_entity(asteroid).unwrap().unwrap().is::<Asteroid>());
    assert!(entities.get_entity(beacon).unwrap().unwrap().is::<Beacon>());

    entities.destroy_entity(asteroid).unwrap();
    assert!(entities.get_entity(asteroid).unwrap().is_none());

    let reissued = entities.create_entity(Beacon).unwrap();
    assert_eq!(reissued, asteroid);
    assert!(entities.get_entity(reissued).unwrap().unwrap().is::<Beacon>());
    assert_eq!(entities.iter::<Beacon>().count(), 2);
    assert_eq!(entities.iter::<Asteroid>().count(), 0);
}

#[test]
fn test_chunk_capacity_override() {
    let mut config = EntityConfig {
        chunk_capacity: 64,
        ..EntityConfig::default()
    };
    config
        .chunk_capacity_overrides
        .push(tessera_core::ChunkCapacityOverride {
            type_id: Beacon::TYPE_ID,
            chunk_capacity: 2,
        });
    let mut entities = EntityManager::new(&config, GlobalMemory::shared(1024 * 1024));

    for mass in 0..5 {
        entities.create_entity(Asteroid { mass }).unwrap();
        entities.create_entity(Beacon).unwrap();
    }

    assert_eq!(entities.chunk_count::<Asteroid>(), 1);
    assert_eq!(entities.chunk_count::<Beacon>(), 3);
}

#[test]
fn test_out_of_memory_under_tiny_budget() {
    let memory = GlobalMemory::shared(256);
    let config = EntityConfig {
        chunk_capacity: 8,
        ..EntityConfig::default()
    };
    let mut entities = EntityManager::new(&config, memory.clone());

    let mut created = 0;
    let error = loop {
        match entities.create_entity(Asteroid { mass: created }) {
            Ok(_) => created += 1,
            Err(error) => break error,
        }
        assert!(created < 1_000, "budget never ran out");
    };

    assert!(matches!(error, EcsError::OutOfMemory { tag: CHUNK_MEMORY_TAG, .. }));
    assert_eq!(entities.entity_count(), created as usize);
    assert!(created > 0);

    drop(entities);
    assert_eq!(memory.lock().used(), 0);
    assert_eq!(memory.lock().live_blocks(), 0);
}
