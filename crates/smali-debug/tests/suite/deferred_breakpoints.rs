use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use smali_debug::{
    ArtifactPosition, ClassPrepareHook, ClassPrepareRequestor, DebugProcess, PositionConfig,
    PositionManager, RuntimeTypeHandle, SourceFile, WatchState,
};

use crate::harness::{bar_smali, Fixture};

#[test]
fn breakpoint_in_unloaded_class_completes_on_prepare() {
    let fx = Fixture::new();
    let file = fx.add_file(bar_smali());
    let pos = fx.position_at(file, "return-void");

    assert!(fx.manager.runtime_locations(&pos).expect("valid query").is_empty());

    let prepared: Arc<Mutex<Vec<RuntimeTypeHandle>>> = Arc::default();
    let sink = prepared.clone();
    let watch = fx
        .manager
        .create_prepare_request(&pos, move |_: &dyn DebugProcess, ty: &RuntimeTypeHandle| {
            sink.lock().push(ty.clone());
        })
        .expect("armed");
    assert_eq!(watch.state(), WatchState::Armed);
    assert_eq!(
        fx.process.active_requests(),
        vec![(watch.request_id(), "com.example.Bar".to_string())]
    );

    let (bar, events) = fx
        .process
        .prepare_class("com.example.Bar", &["run()V"]);
    for event in &events {
        fx.manager.watches().dispatch(event);
    }
    for event in &events {
        assert_eq!(fx.manager.watches().dispatch(event), 0);
    }

    assert_eq!(*prepared.lock(), vec![bar.clone()]);
    assert_eq!(watch.state(), WatchState::Fired);
    assert!(fx.process.active_requests().is_empty());

    let locations = fx.manager.locations_of_line(&bar, &pos).expect("resolved");
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].code_index, 3);
}

#[test]
fn requestor_receives_the_process_handle() {
    let fx = Fixture::new();
    let file = fx.add_file(bar_smali());
    let pos = fx.position_at(file, "return-void");

    let loaded = Arc::new(AtomicUsize::new(0));
    let seen = loaded.clone();
    fx.manager
        .create_prepare_request(&pos, move |process: &dyn DebugProcess, ty: &RuntimeTypeHandle| {
            let classes = process.classes_by_name(&ty.name).expect("process alive");
            seen.store(classes.len(), Ordering::SeqCst);
        })
        .expect("armed");

    let (_, events) = fx.process.prepare_class("com.example.Bar", &[]);
    assert_eq!(fx.manager.watches().dispatch(&events[0]), 1);
    assert_eq!(loaded.load(Ordering::SeqCst), 1);
}

#[test]
fn prepare_event_from_host_thread_fires_once() {
    let fx = Fixture::new();
    let file = fx.add_file(bar_smali());
    let pos = fx.position_at(file, "return-void");

    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let watch = fx
        .manager
        .create_prepare_request(&pos, move |_: &dyn DebugProcess, _: &RuntimeTypeHandle| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("armed");

    let (_, events) = fx.process.prepare_class("com.example.Bar", &[]);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = fx.manager.clone();
            let event = events[0].clone();
            thread::spawn(move || manager.watches().dispatch(&event))
        })
        .collect();
    let fired: usize = handles
        .into_iter()
        .map(|h| h.join().expect("dispatch thread"))
        .sum();

    assert_eq!(fired, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(watch.state(), WatchState::Fired);
}

#[test]
fn cancel_racing_prepare_makes_exactly_one_transition() {
    let fx = Fixture::new();
    let file = fx.add_file(bar_smali());
    let pos = fx.position_at(file, "return-void");

    for _ in 0..64 {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let watch = fx
            .manager
            .create_prepare_request(&pos, move |_: &dyn DebugProcess, _: &RuntimeTypeHandle| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .expect("armed");
        let (_, events) = fx.process.prepare_class("com.example.Bar", &[]);
        let event = events
            .into_iter()
            .find(|event| event.request_id == watch.request_id())
            .expect("event for this watch");

        let manager = fx.manager.clone();
        let dispatcher = thread::spawn(move || manager.watches().dispatch(&event));
        let cancelled = fx.manager.watches().cancel(&watch);
        let fired = dispatcher.join().expect("dispatch thread");

        assert_eq!(usize::from(cancelled) + fired, 1);
        assert_eq!(count.load(Ordering::SeqCst), fired);
        let expected = if cancelled {
            WatchState::Cancelled
        } else {
            WatchState::Fired
        };
        assert_eq!(watch.state(), expected);
    }
    assert_eq!(fx.manager.watches().armed_count(), 0);
}

#[test]
fn watch_on_foreign_file_is_no_mapping() {
    let fx = Fixture::new();
    let java = fx.add_file(SourceFile::foreign("Bar.java", "class Bar {}\n"));
    let pos = fx.position_at_line(java, 1);

    let err = fx
        .manager
        .create_prepare_request(&pos, |_: &dyn DebugProcess, _: &RuntimeTypeHandle| {})
        .expect_err("not smali");
    assert!(err.is_no_mapping());
    assert!(fx.process.active_requests().is_empty());
}

#[test]
fn detach_cancels_pending_watches() {
    let fx = Fixture::new();
    let file = fx.add_file(bar_smali());
    let pos = fx.position_at(file, "return-void");

    let watch = fx
        .manager
        .create_prepare_request(&pos, |_: &dyn DebugProcess, _: &RuntimeTypeHandle| {
            panic!("must not fire after detach");
        })
        .expect("armed");
    assert_eq!(fx.manager.watches().cancel_all(), 1);
    assert_eq!(watch.state(), WatchState::Cancelled);

    let (_, events) = fx.process.prepare_class("com.example.Bar", &[]);
    assert!(events.is_empty());
    assert!(!fx.manager.watches().cancel(&watch));
}

#[derive(Clone, Default)]
struct RecordingHook {
    seen: Arc<Mutex<Vec<(ArtifactPosition, RuntimeTypeHandle)>>>,
}

impl ClassPrepareHook for RecordingHook {
    fn on_class_prepare(
        &self,
        process: &dyn DebugProcess,
        ty: &RuntimeTypeHandle,
        pos: &ArtifactPosition,
        requestor: &dyn ClassPrepareRequestor,
    ) {
        self.seen.lock().push((pos.clone(), ty.clone()));
        requestor.process_class_prepare(process, ty);
    }
}

#[test]
fn custom_hook_sees_the_watched_position() {
    let fx = Fixture::new();
    let file = fx.add_file(bar_smali());
    let pos = fx.position_at(file, "return-void");

    let hook = RecordingHook::default();
    let manager = PositionManager::new(
        fx.store.clone(),
        fx.index.clone(),
        fx.process.clone(),
        PositionConfig::default(),
    )
    .expect("valid config")
    .with_hook(hook.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let count = fired.clone();
    let watch = manager
        .create_prepare_request(&pos, move |_: &dyn DebugProcess, _: &RuntimeTypeHandle| {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .expect("armed");

    let (bar, events) = fx.process.prepare_class("com.example.Bar", &["run()V"]);
    assert_eq!(events.len(), 1);
    assert_eq!(manager.watches().dispatch(&events[0]), 1);

    assert_eq!(*hook.seen.lock(), vec![(pos.clone(), bar.clone())]);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(watch.state(), WatchState::Fired);

    let locations = manager.locations_of_line(&bar, &pos).expect("resolved");
    assert_eq!(locations.len(), 1);
}
