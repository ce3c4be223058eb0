//! Integration tests for the session runtime: registry lifecycle,
//! loading, tree materialization, time ranges, and the async batch
//! barrier discipline.

mod common;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use abc_import::core::{SampleSelector, TimeSampling, TimeSamplingInfo};
use abc_import::session::{
    AsyncDispatcher, AsyncTask, NodeSampler, SceneNode, SessionConfig, SessionRegistry, TaskLatch,
    UpdateContext,
};

use common::{write_archive, write_hdf5_stub, FixtureObject};

/// Default sampling slot the archive reserves at index 0.
fn default_sampling() -> TimeSamplingInfo {
    TimeSamplingInfo::new(TimeSampling::IDENTITY, 1)
}

/// Small animated fixture: two top objects, one with two children.
fn standard_tree() -> Vec<FixtureObject> {
    vec![
        FixtureObject::with_children(
            "group1",
            "AbcGeom_Xform_v3",
            vec![
                FixtureObject::new("meshA", "AbcGeom_PolyMesh_v1"),
                FixtureObject::new("meshB", "AbcGeom_PolyMesh_v1"),
            ],
        ),
        FixtureObject::new("camera", "AbcGeom_Camera_v1"),
    ]
}

#[test]
fn test_load_materializes_preorder_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.abc");
    write_archive(&path, standard_tree(), &[default_sampling()]).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));

    // One node per archive object; pre-order, native child order.
    let names: Vec<&str> = session.nodes().map(|n| n.name()).collect();
    assert_eq!(names, ["", "group1", "meshA", "meshB", "camera"]);
    assert_eq!(session.node_count() - 1, 4);

    let top = session.top_node().expect("top node after load");
    let top_node = session.node(top).unwrap();
    assert_eq!(top_node.children().len(), 2);
    assert!(top_node.parent().is_none());

    let group1 = session.node(top_node.children()[0]).unwrap();
    assert_eq!(group1.full_path(), "/group1");
    assert_eq!(group1.parent(), Some(top));
    let mesh_b = session.node(group1.children()[1]).unwrap();
    assert_eq!(mesh_b.full_path(), "/group1/meshB");
    assert_eq!(mesh_b.object().schema(), "AbcGeom_PolyMesh_v1");
}

#[test]
fn test_load_empty_path_returns_false() {
    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(!session.load(""));
    assert!(!session.is_loaded());
    assert_eq!(session.path(), "");
    assert!(session.top_node().is_none());
}

#[test]
fn test_reload_same_path_skips_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.abc");
    write_archive(&path, standard_tree(), &[default_sampling()]).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));

    // With the file gone, a second load can only succeed through the
    // idempotent fast path.
    fs::remove_file(&path).unwrap();
    assert!(session.load(path.to_str().unwrap()));
    assert!(session.is_loaded());
}

#[test]
fn test_failed_load_leaves_session_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.abc");
    fs::write(&path, b"definitely not a scene archive, long enough to have a header").unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(!session.load(path.to_str().unwrap()));
    assert!(!session.is_loaded());
    assert_eq!(session.path(), "");
    assert_eq!(session.time_sampling_count(), 0);

    // Repeated failed loads are safe.
    assert!(!session.load(path.to_str().unwrap()));
    assert!(!session.is_loaded());
}

/// A crafted archive whose root group claims an absurd child count
/// must fail the load as an ordinary boolean, never fault.
#[test]
fn test_fabricated_child_count_fails_load_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_count.abc");

    let mut buf = Vec::new();
    buf.extend_from_slice(b"Ogawa");
    buf.push(0xFF);
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&16u64.to_le_bytes()); // root group right after header
    buf.extend_from_slice(&(1u64 << 62).to_le_bytes()); // claimed child count
    fs::write(&path, &buf).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(!session.load(path.to_str().unwrap()));
    assert!(!session.is_loaded());
    assert_eq!(session.path(), "");
    assert_eq!(session.node_count(), 0);
}

#[test]
fn test_legacy_hdf5_archive_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.abc");
    write_hdf5_stub(&path).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(!session.load(path.to_str().unwrap()));
    assert!(!session.is_loaded());
}

#[test]
fn test_load_new_path_replaces_old_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.abc");
    let path_b = dir.path().join("b.abc");
    write_archive(&path_a, standard_tree(), &[default_sampling()]).unwrap();
    write_archive(
        &path_b,
        vec![FixtureObject::new("solo", "")],
        &[default_sampling()],
    )
    .unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path_a.to_str().unwrap()));
    assert_eq!(session.node_count(), 5);

    assert!(session.load(path_b.to_str().unwrap()));
    assert_eq!(session.node_count(), 2);
    assert_eq!(session.path(), path_b.to_str().unwrap());
}

#[test]
fn test_time_range_needs_two_samplings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("static.abc");
    write_archive(&path, standard_tree(), &[default_sampling()]).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));
    assert_eq!(session.time_sampling_count(), 1);
    assert_eq!(session.time_range(), (0.0, 0.0));
}

#[test]
fn test_time_range_empty_sampling_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_table.abc");
    write_archive(&path, standard_tree(), &[]).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));
    assert_eq!(session.time_sampling_count(), 0);
    assert_eq!(session.time_range(), (0.0, 0.0));
}

#[test]
fn test_time_range_excludes_default_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anim.abc");
    // Index 0 covers a huge range but is reserved; it must not widen
    // the aggregate.
    let samplings = [
        TimeSamplingInfo::new(TimeSampling::uniform(1.0, -100.0), 1000),
        TimeSamplingInfo::new(TimeSampling::uniform(0.5, 1.0), 5),
        TimeSamplingInfo::new(TimeSampling::acyclic(vec![0.0, 10.0]), 2),
    ];
    write_archive(&path, standard_tree(), &samplings).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));
    assert_eq!(session.time_sampling_count(), 3);

    // min(1.0, 0.0) .. max(3.0, 10.0)
    let (begin, end) = session.time_range();
    assert!((begin - 0.0).abs() < 1e-10);
    assert!((end - 10.0).abs() < 1e-10);
}

#[test]
fn test_time_sampling_index_matches_identity_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anim.abc");
    let samplings = [
        default_sampling(),
        TimeSamplingInfo::new(TimeSampling::uniform(0.5, 1.0), 5),
    ];
    write_archive(&path, standard_tree(), &samplings).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));

    let own = session.time_sampling(1).unwrap().clone();
    assert_eq!(session.time_sampling_index(&own), 1);

    // An equal but foreign descriptor is not the archive's: index 0.
    let foreign = Arc::new(TimeSamplingInfo::new(TimeSampling::uniform(0.5, 1.0), 5));
    assert_eq!(session.time_sampling_index(&foreign), 0);
}

#[test]
fn test_config_survives_reset_and_failed_load() {
    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    let config = SessionConfig {
        interpolate_samples: true,
        time_scale: 2.0,
        time_offset: -1.0,
    };
    session.set_config(config);

    assert!(!session.load(""));
    assert_eq!(*session.config(), config);

    session.reset();
    assert_eq!(*session.config(), config);
}

#[test]
fn test_destroy_all_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.abc");
    let path_b = dir.path().join("b.abc");
    write_archive(&path_a, standard_tree(), &[default_sampling()]).unwrap();
    write_archive(&path_b, standard_tree(), &[default_sampling()]).unwrap();

    let mut registry = SessionRegistry::new();
    assert!(registry.get_or_create(1).load(path_a.to_str().unwrap()));
    assert!(registry.get_or_create(2).load(path_a.to_str().unwrap()));
    assert!(registry.get_or_create(3).load(path_b.to_str().unwrap()));
    registry.get_or_create(4); // never loaded

    registry.destroy_all_with_path(path_a.to_str().unwrap());
    assert!(registry.get(1).is_none());
    assert!(registry.get(2).is_none());
    assert!(registry.get(3).is_some());
    assert!(registry.get(4).is_some());
    assert_eq!(registry.len(), 2);
}

// ---------------------------------------------------------------------------
// Async batching / barrier
// ---------------------------------------------------------------------------

/// Dispatcher that accepts batches without running them; tasks count
/// as complete as soon as they are joined.
struct NullDispatcher;

impl AsyncDispatcher for NullDispatcher {
    fn dispatch(&self, _batch: &[Arc<dyn AsyncTask>]) {}
}

#[derive(Default)]
struct RecordingTask {
    joined: AtomicBool,
}

impl AsyncTask for RecordingTask {
    fn run(&self) {}

    fn wait(&self) {
        self.joined.store(true, Ordering::SeqCst);
    }
}

/// Queues one task per update and asserts that every task queued by
/// earlier updates has already been joined.
struct QueueingSampler {
    log: Arc<Mutex<Vec<Arc<RecordingTask>>>>,
}

impl NodeSampler for QueueingSampler {
    fn update_sample(
        &mut self,
        _node: &SceneNode,
        _selector: SampleSelector,
        ctx: &mut UpdateContext,
    ) {
        let mut log = self.log.lock().unwrap();
        for earlier in log.iter() {
            assert!(
                earlier.joined.load(Ordering::SeqCst),
                "previous frame's batch not drained before sync phase"
            );
        }
        let task = Arc::new(RecordingTask::default());
        log.push(Arc::clone(&task));
        ctx.queue_async(task);
    }
}

#[test]
fn test_previous_batch_joined_before_next_sync_phase() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.abc");
    write_archive(&path, standard_tree(), &[default_sampling()]).unwrap();

    let mut registry = SessionRegistry::with_dispatcher(Arc::new(NullDispatcher));
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));

    let log = Arc::new(Mutex::new(Vec::new()));
    let top = session.top_node().unwrap();
    assert!(session.set_sampler(top, Box::new(QueueingSampler { log: Arc::clone(&log) })));

    session.update_samples(0.0);
    session.update_samples(1.0);
    session.update_samples(2.0);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    assert!(log[0].joined.load(Ordering::SeqCst));
    assert!(log[1].joined.load(Ordering::SeqCst));
    // The last batch is still outstanding until the next barrier.
    assert!(!log[2].joined.load(Ordering::SeqCst));
}

struct SlowTask {
    latch: TaskLatch,
    running: AtomicBool,
    done: AtomicBool,
}

impl AsyncTask for SlowTask {
    fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        self.done.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.latch.complete();
    }

    fn wait(&self) {
        self.latch.wait();
    }
}

struct SlowSampler {
    task: Arc<SlowTask>,
}

impl NodeSampler for SlowSampler {
    fn update_sample(
        &mut self,
        _node: &SceneNode,
        _selector: SampleSelector,
        ctx: &mut UpdateContext,
    ) {
        ctx.queue_async(Arc::clone(&self.task) as Arc<dyn AsyncTask>);
    }
}

#[test]
fn test_reset_blocks_until_tasks_finish() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.abc");
    write_archive(&path, standard_tree(), &[default_sampling()]).unwrap();

    // Real dispatcher: the task genuinely runs on a worker thread.
    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));

    let task = Arc::new(SlowTask {
        latch: TaskLatch::new(),
        running: AtomicBool::new(false),
        done: AtomicBool::new(false),
    });
    let top = session.top_node().unwrap();
    session.set_sampler(top, Box::new(SlowSampler { task: Arc::clone(&task) }));

    session.update_samples(0.0);
    session.reset();

    // reset() may only return once the in-flight task has completed.
    assert!(task.done.load(Ordering::SeqCst));
    assert!(!task.running.load(Ordering::SeqCst));
    assert!(!session.is_loaded());
}

#[test]
fn test_destroy_joins_in_flight_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.abc");
    write_archive(&path, standard_tree(), &[default_sampling()]).unwrap();

    let mut registry = SessionRegistry::new();
    let task = Arc::new(SlowTask {
        latch: TaskLatch::new(),
        running: AtomicBool::new(false),
        done: AtomicBool::new(false),
    });
    {
        let session = registry.get_or_create(1);
        assert!(session.load(path.to_str().unwrap()));
        let top = session.top_node().unwrap();
        session.set_sampler(top, Box::new(SlowSampler { task: Arc::clone(&task) }));
        session.update_samples(0.0);
    }

    registry.destroy(1);
    assert!(task.done.load(Ordering::SeqCst));
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

/// Resolves each frame's selector against the archive sampling, the
/// way a host decode step picks the sample to fetch.
struct ResolvingSampler {
    sampling: TimeSampling,
    num_samples: usize,
    resolved: Arc<Mutex<Vec<usize>>>,
}

impl NodeSampler for ResolvingSampler {
    fn update_sample(
        &mut self,
        _node: &SceneNode,
        selector: SampleSelector,
        _ctx: &mut UpdateContext,
    ) {
        let idx = selector.resolve(&self.sampling, self.num_samples);
        self.resolved.lock().unwrap().push(idx);
    }
}

#[test]
fn test_end_to_end_nested_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.abc");
    // Root plus 3 nested objects, 2 time samplings.
    let tree = vec![FixtureObject::with_children(
        "a",
        "",
        vec![FixtureObject::with_children(
            "b",
            "",
            vec![FixtureObject::new("c", "")],
        )],
    )];
    let animated = TimeSamplingInfo::new(TimeSampling::uniform(1.0 / 24.0, 0.0), 48);
    write_archive(&path, tree, &[default_sampling(), animated.clone()]).unwrap();

    let mut registry = SessionRegistry::new();
    let session = registry.get_or_create(1);
    assert!(session.load(path.to_str().unwrap()));

    assert!(session.top_node().is_some());
    assert_eq!(session.node_count() - 1, 3);

    let names: Vec<&str> = session.nodes().map(|n| n.name()).collect();
    assert_eq!(names, ["", "a", "b", "c"]);

    assert_eq!(session.time_sampling_count(), 2);
    assert_eq!(session.time_range(), animated.time_range());

    let resolved = Arc::new(Mutex::new(Vec::new()));
    let top = session.top_node().unwrap();
    session.set_sampler(
        top,
        Box::new(ResolvingSampler {
            sampling: animated.sampling.clone(),
            num_samples: animated.max_num_samples,
            resolved: Arc::clone(&resolved),
        }),
    );

    session.update_samples(0.5);
    session.update_samples(1.0);

    // Default config: nearest sample, no scaling. 24 fps.
    assert_eq!(*resolved.lock().unwrap(), [12, 24]);
}
