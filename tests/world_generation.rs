mod common;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use gaea::{
    mesh::{GeodesicMesh, MeshConfig, MeshSource, RawMesh},
    spatial::{GeoCoord, TILE_GEO_KEY},
    store::{MemoryStore, Store},
    world, ElevationSource, Engine, EngineBuilder, Error,
};

#[tokio::test]
async fn reset_reports_world_and_roster() {
    let engine = common::engine_with(common::config(common::roster()), common::flat(50));
    let summary = engine.reset().await.expect("reset");

    let d = common::DIVISIONS as usize;
    assert_eq!(summary.tiles, 10 * d * d + 2);
    assert!(summary.indexed <= summary.tiles);
    assert!(summary.indexed > summary.tiles * 9 / 10);
    assert_eq!(summary.players, 3);
    assert_eq!(summary.units, 3 * 3);
    assert_eq!(common::all_tiles(&engine).await.len(), summary.tiles);
}

#[tokio::test]
async fn adjacency_is_symmetric_and_bounded() {
    let engine = common::land_world().await;
    let tiles = common::all_tiles(&engine).await;
    let by_id: HashMap<_, _> = tiles.iter().map(|t| (t.id.clone(), t)).collect();

    let mut pentagons = 0;
    for tile in &tiles {
        let distinct: BTreeSet<_> = tile.neighbors.iter().collect();
        assert_eq!(distinct.len(), tile.neighbors.len(), "duplicate neighbor");
        assert!(!tile.neighbors.contains(&tile.id));
        assert!(matches!(tile.neighbors.len(), 5 | 6));
        if tile.neighbors.len() == 5 {
            pentagons += 1;
        }
        for neighbor in &tile.neighbors {
            assert!(by_id[neighbor].neighbors.contains(&tile.id));
        }
    }
    assert_eq!(pentagons, 12);
}

#[tokio::test]
async fn polar_tiles_stay_out_of_the_index() {
    let engine = common::land_world().await;
    let pole = engine.config().world.pole_exclusion_lat;
    let indexed: BTreeSet<String> = engine
        .store()
        .georadius(TILE_GEO_KEY, 0.0, 0.0, 25_000.0)
        .await
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    for tile in common::all_tiles(&engine).await {
        assert_eq!(
            indexed.contains(&tile.id),
            world::indexable(tile.latlon.lat, pole),
            "tile {} at lat {}",
            tile.id,
            tile.latlon.lat
        );
    }
}

#[tokio::test]
async fn nearest_tile_is_stable_and_finds_itself() {
    let engine = common::land_world().await;
    let first = engine.nearest_tile(GeoCoord::new(12.0, 34.0)).await.unwrap();
    let again = engine.nearest_tile(GeoCoord::new(12.0, 34.0)).await.unwrap();
    assert_eq!(first, again);

    let tile = engine.entities().tile(&first.tile_id).await.unwrap();
    let itself = engine.nearest_tile(tile.latlon).await.unwrap();
    assert_eq!(itself.tile_id, tile.id);
    assert!(itself.distance_km < 1.0);
}

/// Tile id and elevation nearest to a handful of fixed points.
async fn sample_elevations(engine: &Engine) -> Vec<(String, i32)> {
    let points = [(0.0, 0.0), (45.5, -73.5), (-33.9, 151.2), (60.0, 100.0), (-10.0, -50.0)];
    let mut found = Vec::new();
    for (lat, lon) in points {
        let id = common::nearest_id(engine, lat, lon).await;
        let elevation = engine.tile_view(&id).await.unwrap().elevation;
        found.push((id, elevation));
    }
    found
}

#[tokio::test]
async fn same_seed_builds_the_same_world() {
    let a = common::engine_with(common::config(common::roster()), common::ramp());
    let b = common::engine_with(common::config(common::roster()), common::ramp());
    a.reset().await.unwrap();
    b.reset().await.unwrap();

    let sampled = sample_elevations(&a).await;
    let distinct: BTreeSet<_> = sampled.iter().map(|(_, e)| *e).collect();
    assert!(distinct.len() > 1, "elevations should vary: {sampled:?}");
    assert_eq!(sample_elevations(&b).await, sampled);

    let mut tiles_a = common::all_tiles(&a).await;
    let mut tiles_b = common::all_tiles(&b).await;
    tiles_a.sort_by(|x, y| x.id.cmp(&y.id));
    tiles_b.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(tiles_a, tiles_b);

    for player in ["p-joel", "p-mark", "p-michael"] {
        let mut units_a = a.units_for_player(player).await.unwrap();
        let mut units_b = b.units_for_player(player).await.unwrap();
        units_a.sort_by(|x, y| x.id.cmp(&y.id));
        units_b.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(units_a, units_b);
    }

    // Regenerating in place reproduces it as well.
    a.reset().await.unwrap();
    assert_eq!(sample_elevations(&a).await, sampled);
    let mut again = common::all_tiles(&a).await;
    again.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(again, tiles_b);
}

#[tokio::test]
async fn different_seed_draws_different_ids() {
    let a = common::land_world().await;
    let mut config = common::config(common::roster());
    config.seeding.seed = 7;
    let b = common::engine_with(config, common::flat(50));
    b.reset().await.unwrap();

    let id_a = common::nearest_id(&a, 0.0, 0.0).await;
    let id_b = common::nearest_id(&b, 0.0, 0.0).await;
    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn tile_view_lists_neighbors_with_bearings() {
    let engine = common::land_world().await;
    let id = common::nearest_id(&engine, -20.0, 60.0).await;
    let view = engine.tile_view(&id).await.unwrap();
    assert_eq!(view.elevation, 50);
    assert!(matches!(view.neighbors.len(), 5 | 6));
    for neighbor in &view.neighbors {
        assert!((0.0..360.0).contains(&neighbor.bearing));
    }

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["type"], "tile");
    assert!(json["latlon"]["lat"].is_number());
    assert!(json["occupants"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn map_marks_land_and_water() {
    let land = common::land_world().await;
    let map = land.render_map().await.unwrap();
    assert!(map.starts_with('\n'));
    let rows: Vec<&str> = map.split('\n').skip(1).collect();
    assert_eq!(rows.len(), 34);
    for row in &rows {
        assert_eq!(row.len(), 72);
        assert!(row.chars().all(|c| c == ' '));
    }

    let mut config = common::config(common::roster());
    config.seeding.allow_water_start = true;
    let sea = common::engine_with(config, common::flat(0));
    sea.reset().await.unwrap();
    let map = sea.render_map().await.unwrap();
    assert!(map.split('\n').skip(1).all(|row| row.chars().all(|c| c == 'x')));
}

#[tokio::test]
async fn failed_reset_keeps_the_previous_world() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let good = common::engine_on(store.clone(), common::config(common::roster()), common::flat(50));
    good.reset().await.unwrap();
    let before = common::nearest_id(&good, 10.0, 10.0).await;

    let broken = EngineBuilder::new(store, common::config(common::roster()))
        .with_elevation(ElevationSource::File("does/not/exist.png".into()))
        .build();
    let err = broken.reset().await.unwrap_err();
    assert!(matches!(err, Error::Raster(_)));
    assert!(!broken.is_generating());

    assert_eq!(common::nearest_id(&good, 10.0, 10.0).await, before);
    assert!(good.player_view("p-joel").await.is_ok());
}

struct SlowMesh(Duration);

impl MeshSource for SlowMesh {
    fn generate(&self, config: &MeshConfig) -> gaea::Result<RawMesh> {
        std::thread::sleep(self.0);
        GeodesicMesh.generate(config)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn requests_fail_fast_while_generating() {
    let engine = Arc::new(
        EngineBuilder::new(
            Arc::new(MemoryStore::new()),
            common::config(common::roster()),
        )
        .with_mesh(SlowMesh(Duration::from_millis(600)))
        .with_elevation(ElevationSource::Fixed(Arc::new(common::flat(50))))
        .build(),
    );

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reset().await })
    };
    for _ in 0..50 {
        if engine.is_generating() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.is_generating());

    assert!(matches!(engine.tile_view("anything").await, Err(Error::Generating)));
    assert!(matches!(engine.player_view("p-joel").await, Err(Error::Generating)));
    assert!(matches!(engine.render_map().await, Err(Error::Generating)));
    assert!(matches!(engine.reset().await, Err(Error::Generating)));

    running.await.unwrap().expect("reset completes");
    assert!(!engine.is_generating());
    assert_eq!(engine.player_view("p-joel").await.unwrap().name, "joel");
}

#[test]
fn shipped_config_and_raster_load() {
    let config = gaea::ConfigLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("config/gaea.yaml")
        .expect("shipped config loads");
    assert_eq!(config.seeding.roster.len(), 3);

    let raster = gaea::raster::ElevationRaster::load(&config.world.elevation_image)
        .expect("shipped raster loads");
    assert_eq!((raster.width(), raster.height()), (360, 180));
    for entry in &config.seeding.roster {
        assert!(raster.sample(GeoCoord::new(entry.lat, entry.lon)) > 0, "{} starts at sea", entry.name);
    }
}
