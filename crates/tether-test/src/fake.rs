//! Scripted in-process stand-in for the foreign library
//!
//! [`FakeBackend`] hands out fake pointers, keeps a parent/child table
//! of everything it constructed, and records every call in a journal.
//! Server traffic is scripted: tests queue deliveries, and
//! [`Backend::main_loop_run`] replays them through the attached
//! callbacks until the loop is asked to quit or the script runs dry.
//!
//! A real loop blocks forever once it has nothing to do; the fake returns
//! instead and counts the run as exhausted, so a test that forgets to
//! script a reply fails rather than hangs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::{c_char, c_int, c_void, CString};
use std::rc::Rc;

use parking_lot::Mutex;
use tether_core::{HandleKind, ObjectId};
use tether_ffi::sys::*;
use tether_ffi::Backend;

use crate::journal::{JournalEntry, Violation};

const EINVAL: c_int = 22;
const EBUSY: c_int = 16;

/// A scripted server notification
#[derive(Clone, Debug)]
pub enum Delivery {
    Global {
        id: u32,
        type_name: String,
        props: Vec<(String, String)>,
    },
    GlobalRemove {
        id: u32,
    },
    NodeInfo {
        id: u32,
        change_mask: u64,
        props: Option<Vec<(String, String)>>,
    },
    Done {
        id: u32,
        seq: i32,
    },
    Error {
        id: u32,
        seq: i32,
        code: i32,
        message: String,
    },
}

#[derive(Clone, Copy, Debug)]
struct FakeObject {
    kind: HandleKind,
    serial: usize,
    parent: Option<usize>,
    global: Option<u32>,
}

#[derive(Clone, Copy)]
enum Events {
    Core(CoreEvents),
    Registry(RegistryEvents),
    Node(NodeEvents),
}

#[derive(Clone, Copy)]
struct Listener {
    owner: usize,
    events: Events,
    data: usize,
}

#[derive(Default)]
struct FakeState {
    next_serial: usize,
    objects: HashMap<usize, FakeObject>,
    listeners: HashMap<usize, Listener>,
    journal: Vec<JournalEntry>,
    violations: Vec<Violation>,
    init_depth: i32,
    fail_construct: HashSet<HandleKind>,
    fail_bind: HashSet<u32>,
    fail_sync: Option<c_int>,
    queue: VecDeque<Delivery>,
    running: bool,
    quit_requested: bool,
    quit_calls: usize,
    runs: usize,
    exhausted_runs: usize,
    next_seq: i32,
    last_sync: Option<i32>,
    hold_sync_replies: bool,
}

/// Fake foreign library
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh backend, ready to be shared with a `Library`
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Queue a registry announcement of a new global
    pub fn announce_global(&self, id: u32, type_name: &str, props: &[(&str, &str)]) {
        self.push(Delivery::Global {
            id,
            type_name: type_name.to_string(),
            props: owned_props(props),
        });
    }

    /// Queue a registry removal
    pub fn remove_global(&self, id: u32) {
        self.push(Delivery::GlobalRemove { id });
    }

    /// Queue a node info event with changed props
    pub fn node_info(&self, id: u32, props: &[(&str, &str)]) {
        self.push(Delivery::NodeInfo {
            id,
            change_mask: NODE_CHANGE_MASK_PROPS,
            props: Some(owned_props(props)),
        });
    }

    /// Queue a node info event with an explicit change mask and no props
    pub fn node_info_mask(&self, id: u32, change_mask: u64) {
        self.push(Delivery::NodeInfo {
            id,
            change_mask,
            props: None,
        });
    }

    /// Queue a server error
    pub fn core_error(&self, id: u32, seq: i32, code: i32, message: &str) {
        self.push(Delivery::Error {
            id,
            seq,
            code,
            message: message.to_string(),
        });
    }

    /// Queue a completion for marker `seq` on the core object
    pub fn core_done(&self, seq: i32) {
        self.push(Delivery::Done {
            id: ObjectId::CORE.0,
            seq,
        });
    }

    pub fn push(&self, delivery: Delivery) {
        self.state.lock().queue.push_back(delivery);
    }

    /// When held, sync requests get no automatic completion
    pub fn hold_sync_replies(&self, hold: bool) {
        self.state.lock().hold_sync_replies = hold;
    }

    /// Make every constructor of `kind` return null
    pub fn fail_construct(&self, kind: HandleKind) {
        self.state.lock().fail_construct.insert(kind);
    }

    /// Make binding global `id` return null
    pub fn fail_bind(&self, id: u32) {
        self.state.lock().fail_bind.insert(id);
    }

    /// Make sync requests fail with `code`
    pub fn fail_sync(&self, code: c_int) {
        self.state.lock().fail_sync = Some(code);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().journal.clone()
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.state.lock().violations.clone()
    }

    /// Kinds in the order they were destroyed
    pub fn destroyed(&self) -> Vec<HandleKind> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Destroy { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Kinds in the order they were constructed
    pub fn constructed(&self) -> Vec<HandleKind> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Construct { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn live_objects_of(&self, kind: HandleKind) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|o| o.kind == kind)
            .count()
    }

    pub fn live_hooks(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn quit_calls(&self) -> usize {
        self.state.lock().quit_calls
    }

    pub fn runs(&self) -> usize {
        self.state.lock().runs
    }

    /// Runs that returned because the script ran out, not because of quit
    pub fn exhausted_runs(&self) -> usize {
        self.state.lock().exhausted_runs
    }

    pub fn pending_deliveries(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Sequence number handed out by the most recent sync request
    pub fn last_sync(&self) -> Option<i32> {
        self.state.lock().last_sync
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().init_depth > 0
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn construct<T>(&self, kind: HandleKind, parent: Option<usize>, global: Option<u32>) -> *mut T {
        let mut state = self.state.lock();
        if state.init_depth <= 0 {
            state.violations.push(Violation::ConstructOutsideInit { kind });
        }
        if state.fail_construct.contains(&kind) {
            return std::ptr::null_mut();
        }
        state.next_serial += 1;
        let serial = state.next_serial;
        let addr = serial * 16;
        state.objects.insert(
            addr,
            FakeObject {
                kind,
                serial,
                parent,
                global,
            },
        );
        state.journal.push(JournalEntry::Construct { kind, serial });
        addr as *mut T
    }

    fn destroy(&self, kind: HandleKind, addr: usize) {
        let mut state = self.state.lock();
        let Some(object) = state.objects.remove(&addr) else {
            state.violations.push(Violation::DoubleDestroy { kind });
            return;
        };

        let children: Vec<HandleKind> = state
            .objects
            .values()
            .filter(|o| o.parent == Some(addr))
            .map(|o| o.kind)
            .collect();
        for child in children {
            state.violations.push(Violation::ParentDestroyedFirst {
                parent: object.kind,
                child,
            });
        }

        let before = state.listeners.len();
        state.listeners.retain(|_, l| l.owner != addr);
        let dangling = before - state.listeners.len();
        if dangling > 0 {
            state.violations.push(Violation::DestroyedWithHooks {
                kind: object.kind,
                serial: object.serial,
                hooks: dangling,
            });
        }

        state.journal.push(JournalEntry::Destroy {
            kind: object.kind,
            serial: object.serial,
        });
    }

    fn object(&self, addr: usize, call: &'static str) -> Option<FakeObject> {
        let mut state = self.state.lock();
        let object = state.objects.get(&addr).copied();
        if object.is_none() {
            state.violations.push(Violation::UnknownPointer { call });
        }
        object
    }

    fn add_listener(&self, owner: usize, hook: *mut RawHook, events: Events, data: *mut c_void) {
        let Some(object) = self.object(owner, "add_listener") else {
            return;
        };
        let mut state = self.state.lock();
        state.listeners.insert(
            hook as usize,
            Listener {
                owner,
                events,
                data: data as usize,
            },
        );
        state.journal.push(JournalEntry::Attach {
            owner: object.kind,
            serial: object.serial,
        });
    }

    /// Listeners still attached to objects matching `filter`
    fn listeners_where(&self, filter: impl Fn(&FakeObject) -> bool) -> Vec<(usize, Listener)> {
        let state = self.state.lock();
        let mut found: Vec<(usize, Listener)> = state
            .listeners
            .iter()
            .filter(|(_, l)| state.objects.get(&l.owner).is_some_and(&filter))
            .map(|(hook, l)| (*hook, *l))
            .collect();
        found.sort_by_key(|(hook, _)| *hook);
        found
    }

    fn still_attached(&self, hook: usize) -> bool {
        self.state.lock().listeners.contains_key(&hook)
    }

    fn dispatch(&self, delivery: Delivery) {
        match delivery {
            Delivery::Global {
                id,
                type_name,
                props,
            } => {
                let dict = OwnedDict::new(&props);
                let type_c = c_string(&type_name);
                for (hook, listener) in self.listeners_where(|o| o.kind == HandleKind::Registry) {
                    if !self.still_attached(hook) {
                        continue;
                    }
                    if let Events::Registry(events) = listener.events {
                        if let Some(global) = events.global {
                            unsafe {
                                global(
                                    listener.data as *mut c_void,
                                    id,
                                    0o777,
                                    type_c.as_ptr(),
                                    3,
                                    dict.as_ptr(),
                                )
                            };
                        }
                    }
                }
            }
            Delivery::GlobalRemove { id } => {
                for (hook, listener) in self.listeners_where(|o| o.kind == HandleKind::Registry) {
                    if !self.still_attached(hook) {
                        continue;
                    }
                    if let Events::Registry(events) = listener.events {
                        if let Some(global_remove) = events.global_remove {
                            unsafe { global_remove(listener.data as *mut c_void, id) };
                        }
                    }
                }
            }
            Delivery::NodeInfo {
                id,
                change_mask,
                props,
            } => {
                let dict = props.as_deref().map(OwnedDict::new);
                let info = RawNodeInfo {
                    id,
                    max_input_ports: 0,
                    max_output_ports: 0,
                    change_mask,
                    n_input_ports: 0,
                    n_output_ports: 0,
                    state: 0,
                    error: std::ptr::null(),
                    props: dict.as_deref().map_or(std::ptr::null(), OwnedDict::as_ptr),
                };
                let bound = |o: &FakeObject| o.kind == HandleKind::Node && o.global == Some(id);
                for (hook, listener) in self.listeners_where(bound) {
                    if !self.still_attached(hook) {
                        continue;
                    }
                    if let Events::Node(events) = listener.events {
                        if let Some(cb) = events.info {
                            unsafe { cb(listener.data as *mut c_void, &info) };
                        }
                    }
                }
            }
            Delivery::Done { id, seq } => {
                for (hook, listener) in self.listeners_where(|o| o.kind == HandleKind::Core) {
                    if !self.still_attached(hook) {
                        continue;
                    }
                    if let Events::Core(events) = listener.events {
                        if let Some(done) = events.done {
                            unsafe { done(listener.data as *mut c_void, id, seq) };
                        }
                    }
                }
            }
            Delivery::Error {
                id,
                seq,
                code,
                message,
            } => {
                let message_c = c_string(&message);
                for (hook, listener) in self.listeners_where(|o| o.kind == HandleKind::Core) {
                    if !self.still_attached(hook) {
                        continue;
                    }
                    if let Events::Core(events) = listener.events {
                        if let Some(error) = events.error {
                            unsafe {
                                error(
                                    listener.data as *mut c_void,
                                    id,
                                    seq,
                                    code,
                                    message_c.as_ptr(),
                                )
                            };
                        }
                    }
                }
            }
        }
    }
}

impl Backend for FakeBackend {
    fn init(&self) {
        let mut state = self.state.lock();
        state.init_depth += 1;
        if state.init_depth != 1 {
            state.violations.push(Violation::UnbalancedInit);
        }
        state.journal.push(JournalEntry::Init);
    }

    fn deinit(&self) {
        let mut state = self.state.lock();
        state.init_depth -= 1;
        if state.init_depth != 0 {
            state.violations.push(Violation::UnbalancedInit);
        }
        let live = state.objects.len();
        if live > 0 {
            state.violations.push(Violation::DeinitWithLiveObjects { live });
        }
        state.journal.push(JournalEntry::Deinit);
    }

    fn headers_version(&self) -> *const c_char {
        static VERSION: &[u8] = b"1.2.0-fake\0";
        VERSION.as_ptr() as *const c_char
    }

    fn library_version(&self) -> *const c_char {
        static VERSION: &[u8] = b"1.2.7-fake\0";
        VERSION.as_ptr() as *const c_char
    }

    unsafe fn main_loop_new(&self) -> *mut RawMainLoop {
        self.construct(HandleKind::MainLoop, None, None)
    }

    unsafe fn main_loop_destroy(&self, main_loop: *mut RawMainLoop) {
        self.destroy(HandleKind::MainLoop, main_loop as usize);
    }

    unsafe fn main_loop_run(&self, main_loop: *mut RawMainLoop) -> c_int {
        if self.object(main_loop as usize, "main_loop_run").is_none() {
            return -EINVAL;
        }
        {
            let mut state = self.state.lock();
            if state.running {
                state.violations.push(Violation::ReentrantRun);
                return -EBUSY;
            }
            state.running = true;
            state.quit_requested = false;
            state.runs += 1;
            state.journal.push(JournalEntry::Run);
        }

        loop {
            let next = {
                let mut state = self.state.lock();
                if state.quit_requested {
                    break;
                }
                state.queue.pop_front()
            };
            let Some(delivery) = next else {
                tracing::debug!("fake loop ran out of scripted deliveries");
                self.state.lock().exhausted_runs += 1;
                break;
            };
            self.dispatch(delivery);
        }

        let mut state = self.state.lock();
        state.running = false;
        state.quit_requested = false;
        0
    }

    unsafe fn main_loop_quit(&self, main_loop: *mut RawMainLoop) -> c_int {
        if self.object(main_loop as usize, "main_loop_quit").is_none() {
            return -EINVAL;
        }
        let mut state = self.state.lock();
        state.quit_calls += 1;
        if state.running {
            state.quit_requested = true;
        }
        state.journal.push(JournalEntry::Quit);
        0
    }

    unsafe fn context_new(&self, main_loop: *mut RawMainLoop) -> *mut RawContext {
        if self.object(main_loop as usize, "context_new").is_none() {
            return std::ptr::null_mut();
        }
        self.construct(HandleKind::Context, Some(main_loop as usize), None)
    }

    unsafe fn context_destroy(&self, context: *mut RawContext) {
        self.destroy(HandleKind::Context, context as usize);
    }

    unsafe fn context_connect(
        &self,
        context: *mut RawContext,
        _remote_name: *const c_char,
    ) -> *mut RawCore {
        if self.object(context as usize, "context_connect").is_none() {
            return std::ptr::null_mut();
        }
        self.construct(HandleKind::Core, Some(context as usize), None)
    }

    unsafe fn core_disconnect(&self, core: *mut RawCore) -> c_int {
        self.destroy(HandleKind::Core, core as usize);
        0
    }

    unsafe fn core_sync(&self, core: *mut RawCore, id: u32, _seq: c_int) -> c_int {
        if self.object(core as usize, "core_sync").is_none() {
            return -EINVAL;
        }
        let mut state = self.state.lock();
        if let Some(code) = state.fail_sync {
            return code;
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.last_sync = Some(seq);
        state.journal.push(JournalEntry::Sync { seq });
        if !state.hold_sync_replies {
            state.queue.push_back(Delivery::Done { id, seq });
        }
        seq
    }

    unsafe fn core_add_listener(
        &self,
        core: *mut RawCore,
        hook: *mut RawHook,
        events: *const CoreEvents,
        data: *mut c_void,
    ) {
        self.add_listener(core as usize, hook, Events::Core(*events), data);
    }

    unsafe fn core_get_registry(&self, core: *mut RawCore, _version: u32) -> *mut RawRegistry {
        if self.object(core as usize, "core_get_registry").is_none() {
            return std::ptr::null_mut();
        }
        self.construct(HandleKind::Registry, Some(core as usize), None)
    }

    unsafe fn registry_destroy(&self, registry: *mut RawRegistry) {
        self.destroy(HandleKind::Registry, registry as usize);
    }

    unsafe fn registry_add_listener(
        &self,
        registry: *mut RawRegistry,
        hook: *mut RawHook,
        events: *const RegistryEvents,
        data: *mut c_void,
    ) {
        self.add_listener(registry as usize, hook, Events::Registry(*events), data);
    }

    unsafe fn registry_bind(
        &self,
        registry: *mut RawRegistry,
        id: u32,
        _type_: *const c_char,
        _version: u32,
    ) -> *mut RawProxy {
        if self.object(registry as usize, "registry_bind").is_none() {
            return std::ptr::null_mut();
        }
        {
            let mut state = self.state.lock();
            state.journal.push(JournalEntry::Bind { id });
            if state.fail_bind.contains(&id) {
                return std::ptr::null_mut();
            }
        }
        self.construct(HandleKind::Node, Some(registry as usize), Some(id))
    }

    unsafe fn proxy_destroy(&self, proxy: *mut RawProxy) {
        self.destroy(HandleKind::Node, proxy as usize);
    }

    unsafe fn node_add_listener(
        &self,
        node: *mut RawProxy,
        hook: *mut RawHook,
        events: *const NodeEvents,
        data: *mut c_void,
    ) {
        self.add_listener(node as usize, hook, Events::Node(*events), data);
    }

    unsafe fn hook_remove(&self, hook: *mut RawHook) {
        let mut state = self.state.lock();
        let Some(listener) = state.listeners.remove(&(hook as usize)) else {
            return;
        };
        if let Some(owner) = state.objects.get(&listener.owner).copied() {
            state.journal.push(JournalEntry::Detach {
                owner: owner.kind,
                serial: owner.serial,
            });
        }
    }
}

fn owned_props(props: &[(&str, &str)]) -> Vec<(String, String)> {
    props
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// A foreign-layout dictionary kept alive for the length of one delivery
struct OwnedDict {
    _strings: Vec<CString>,
    items: Vec<RawDictItem>,
    raw: RawDict,
}

impl OwnedDict {
    fn new(props: &[(String, String)]) -> Box<Self> {
        let mut strings = Vec::with_capacity(props.len() * 2);
        let mut items = Vec::with_capacity(props.len());
        for (key, value) in props {
            let key = c_string(key);
            let value = c_string(value);
            items.push(RawDictItem {
                key: key.as_ptr(),
                value: value.as_ptr(),
            });
            strings.push(key);
            strings.push(value);
        }
        let mut dict = Box::new(OwnedDict {
            _strings: strings,
            items,
            raw: RawDict {
                flags: 0,
                n_items: 0,
                items: std::ptr::null(),
            },
        });
        dict.raw = RawDict {
            flags: 0,
            n_items: dict.items.len() as u32,
            items: dict.items.as_ptr(),
        };
        dict
    }

    fn as_ptr(&self) -> *const RawDict {
        &self.raw
    }
}
