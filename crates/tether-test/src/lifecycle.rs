//! Handle and hook lifecycle checks against the fake backend

use std::cell::RefCell;
use std::ffi::{c_char, c_void};
use std::rc::Rc;

use proptest::prelude::*;
use proptest::test_runner::TestRunner;
use serial_test::serial;
use tether_core::{HandleKind, ObjectId, PropertyDictionary, TetherError, TetherResult};
use tether_ffi::sys::*;
use tether_ffi::*;

use crate::fake::FakeBackend;
use crate::journal::{JournalEntry, Violation};

const CHAIN: [HandleKind; 4] = [
    HandleKind::MainLoop,
    HandleKind::Context,
    HandleKind::Core,
    HandleKind::Registry,
];

static NO_REGISTRY_EVENTS: RegistryEvents = RegistryEvents {
    version: EVENTS_VERSION,
    global: None,
    global_remove: None,
};

static NO_CORE_EVENTS: CoreEvents = CoreEvents {
    version: EVENTS_VERSION,
    done: None,
    error: None,
};

struct Chain {
    registry: Handle<Registry>,
    core: Handle<Core>,
    _context: Handle<Context>,
    main_loop: Handle<MainLoop>,
}

fn build_chain(backend: Rc<dyn Backend>) -> TetherResult<Chain> {
    let main_loop = Handle::<MainLoop>::new(backend)?;
    let context = Handle::<Context>::new(&main_loop)?;
    let core = Handle::<Core>::connect(&context, None)?;
    let registry = Handle::<Registry>::new(&core, 3)?;
    Ok(Chain {
        registry,
        core,
        _context: context,
        main_loop,
    })
}

fn initialised_fake() -> (Rc<FakeBackend>, Library) {
    let fake = FakeBackend::shared();
    let library = Library::init(fake.clone()).unwrap();
    (fake, library)
}

#[test]
#[serial]
fn test_chain_released_in_reverse_order() {
    let (fake, library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();
    assert_eq!(fake.live_objects(), 4);

    drop(chain);
    drop(library);

    assert_eq!(fake.constructed(), CHAIN.to_vec());
    let mut reversed = CHAIN.to_vec();
    reversed.reverse();
    assert_eq!(fake.destroyed(), reversed);
    assert!(fake.violations().is_empty(), "{:?}", fake.violations());
}

#[test]
#[serial]
fn prop_partial_setup_unwinds_acquired_handles() {
    let mut runner = TestRunner::default();
    runner
        .run(&(0usize..4), |step| {
            let (fake, library) = initialised_fake();
            fake.fail_construct(CHAIN[step]);

            let result = build_chain(fake.clone());
            match result {
                Err(TetherError::ForeignConstruction { kind }) => {
                    prop_assert_eq!(kind, CHAIN[step])
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
                Ok(_) => prop_assert!(false, "setup succeeded despite failure at {step}"),
            }

            let acquired = CHAIN[..step].to_vec();
            let mut released = acquired.clone();
            released.reverse();
            prop_assert_eq!(fake.constructed(), acquired);
            prop_assert_eq!(fake.destroyed(), released);
            prop_assert_eq!(fake.live_objects(), 0);
            drop(library);
            prop_assert!(fake.violations().is_empty());
            Ok(())
        })
        .unwrap();
}

#[test]
#[serial]
fn test_owner_released_before_hook_is_flagged() {
    let (fake, _library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();
    let Chain {
        registry,
        core,
        _context,
        main_loop,
    } = chain;

    let hook = unsafe { registry.attach(&NO_REGISTRY_EVENTS, std::ptr::null_mut()) };
    registry.release();

    assert!(fake.violations().iter().any(|v| matches!(
        v,
        Violation::DestroyedWithHooks {
            kind: HandleKind::Registry,
            hooks: 1,
            ..
        }
    )));

    drop(hook);
    drop(core);
    drop(_context);
    drop(main_loop);
}

#[test]
#[serial]
fn test_nested_hooks_release_cleanly() {
    let (fake, library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();

    let mut hooks = HookTable::new();
    hooks.push(unsafe { chain.core.attach(&NO_CORE_EVENTS, std::ptr::null_mut()) });
    hooks.push(unsafe { chain.registry.attach(&NO_REGISTRY_EVENTS, std::ptr::null_mut()) });
    assert_eq!(fake.live_hooks(), 2);

    drop(hooks);
    drop(chain);
    drop(library);

    let detached: Vec<HandleKind> = fake
        .journal()
        .into_iter()
        .filter_map(|entry| match entry {
            JournalEntry::Detach { owner, .. } => Some(owner),
            _ => None,
        })
        .collect();
    assert_eq!(detached, vec![HandleKind::Registry, HandleKind::Core]);
    assert_eq!(fake.live_hooks(), 0);
    assert!(fake.violations().is_empty(), "{:?}", fake.violations());
}

#[test]
#[serial]
fn test_detach_twice_is_noop() {
    let (fake, _library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();

    let mut hook = unsafe { chain.core.attach(&NO_CORE_EVENTS, std::ptr::null_mut()) };
    assert!(hook.is_attached());
    hook.detach();
    hook.detach();
    assert!(!hook.is_attached());
    drop(hook);

    let detaches = fake
        .journal()
        .iter()
        .filter(|e| matches!(e, JournalEntry::Detach { .. }))
        .count();
    assert_eq!(detaches, 1);
}

#[test]
#[serial]
fn test_bind_failure_is_construction_error() {
    let (fake, _library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();
    fake.fail_bind(7);

    let backend: Rc<dyn Backend> = fake.clone();
    let err = Handle::<Node>::bind(
        &backend,
        chain.registry.borrow(),
        ObjectId(7),
        tether_core::NODE_INTERFACE,
        3,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        TetherError::ForeignConstruction {
            kind: HandleKind::Node
        }
    ));

    let node = Handle::<Node>::bind(
        &backend,
        chain.registry.borrow(),
        ObjectId(8),
        tether_core::NODE_INTERFACE,
        3,
    )
    .unwrap();
    assert_eq!(node.kind(), HandleKind::Node);
    assert_eq!(fake.live_objects_of(HandleKind::Node), 1);
}

type SeenGlobals = RefCell<Vec<(u32, String, PropertyDictionary)>>;

unsafe extern "C" fn record_global(
    data: *mut c_void,
    id: u32,
    _permissions: u32,
    type_: *const c_char,
    _version: u32,
    props: *const RawDict,
) {
    let seen = &*(data as *const SeenGlobals);
    seen.borrow_mut()
        .push((id, copy_string(type_).unwrap_or_default(), copy_dict(props)));
}

#[test]
#[serial]
fn test_scripted_globals_reach_listener() {
    let (fake, _library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();

    let seen: SeenGlobals = RefCell::new(Vec::new());
    let events = RegistryEvents {
        version: EVENTS_VERSION,
        global: Some(record_global),
        global_remove: None,
    };
    let hook = unsafe {
        chain
            .registry
            .attach(&events, &seen as *const SeenGlobals as *mut c_void)
    };

    fake.announce_global(31, "PipeWire:Interface:Node", &[("media.class", "Audio/Sink")]);
    fake.announce_global(32, "PipeWire:Interface:Link", &[]);
    let res = unsafe { fake.main_loop_run(chain.main_loop.as_ptr()) };
    assert_eq!(res, 0);
    assert_eq!(fake.exhausted_runs(), 1);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, 31);
    assert_eq!(seen[0].2.get("media.class"), Some("Audio/Sink"));
    assert_eq!(seen[1].1, "PipeWire:Interface:Link");
    assert!(seen[1].2.is_empty());
    drop(hook);
}

#[test]
#[serial]
fn test_quit_outside_run_has_no_effect() {
    let (fake, _library) = initialised_fake();
    let chain = build_chain(fake.clone()).unwrap();

    unsafe { fake.main_loop_quit(chain.main_loop.as_ptr()) };
    fake.core_done(1);
    unsafe { fake.main_loop_run(chain.main_loop.as_ptr()) };

    assert_eq!(fake.pending_deliveries(), 0);
    assert_eq!(fake.quit_calls(), 1);
}

#[test]
#[serial]
fn test_chain_needs_initialised_library() {
    let fake = FakeBackend::shared();

    assert!(matches!(
        build_chain(fake.clone()),
        Err(TetherError::NotInitialized)
    ));
    assert!(fake.constructed().is_empty());
    assert!(fake.violations().is_empty(), "{:?}", fake.violations());

    let library = Library::init(fake.clone()).unwrap();
    let chain = build_chain(fake.clone()).unwrap();
    drop(chain);
    drop(library);

    assert!(matches!(
        Handle::<MainLoop>::new(fake.clone()),
        Err(TetherError::NotInitialized)
    ));
    assert_eq!(fake.constructed(), CHAIN.to_vec());
}

#[test]
#[serial]
fn test_library_init_is_exclusive() {
    let fake = FakeBackend::shared();
    let library = Library::init(fake.clone()).unwrap();
    assert!(Library::is_initialized());
    assert!(fake.is_initialized());

    assert!(matches!(
        Library::init(fake.clone()),
        Err(TetherError::AlreadyInitialized)
    ));

    drop(library);
    assert!(!Library::is_initialized());
    assert!(!fake.is_initialized());
    assert!(fake.violations().is_empty(), "{:?}", fake.violations());
}

#[test]
#[serial]
fn test_library_versions() {
    let fake = FakeBackend::shared();
    let library = Library::init(fake).unwrap();
    assert_eq!(library.headers_version(), "1.2.0-fake");
    assert_eq!(library.library_version(), "1.2.7-fake");
}

#[test]
#[serial]
fn test_deinit_with_live_objects_is_flagged() {
    let fake = FakeBackend::shared();
    let library = Library::init(fake.clone()).unwrap();
    let main_loop = Handle::<MainLoop>::new(library.backend().clone()).unwrap();
    drop(library);

    assert!(fake
        .violations()
        .contains(&Violation::DeinitWithLiveObjects { live: 1 }));
    drop(main_loop);
}
