//! The instance aggregate
//!
//! An [`Instance`] owns the whole handle chain plus the dispatcher hooks
//! and the boxed [`Session`] they point at. Field order is drop order:
//! hooks go first, then the session (and with it every node binding),
//! then registry, core, context and loop.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;

use tether_core::{RegistryEvent, TetherResult};
use tether_ffi::{Context, Core, Handle, HookTable, Library, MainLoop, Registry};

use crate::config::InstanceConfig;
use crate::session::Session;

pub struct Instance<'lib, S> {
    hooks: HookTable,
    session: Box<Session<S>>,
    registry: Handle<Registry>,
    core: Handle<Core>,
    context: Handle<Context>,
    main_loop: Handle<MainLoop>,
    _library: PhantomData<&'lib Library>,
}

impl<'lib, S: Clone> Instance<'lib, S> {
    /// Build the handle chain and install the dispatcher.
    ///
    /// If any step fails, everything acquired so far is released in
    /// reverse order before the error is returned.
    pub fn new<F>(
        library: &'lib Library,
        config: InstanceConfig,
        initial: S,
        update: F,
    ) -> TetherResult<Self>
    where
        F: FnMut(&Session<S>, RegistryEvent, S) -> S + 'static,
    {
        config.validate()?;
        let backend = Rc::clone(library.backend());

        let main_loop = Handle::<MainLoop>::new(Rc::clone(&backend))?;
        let context = Handle::<Context>::new(&main_loop)?;
        let core = Handle::<Core>::connect(&context, config.remote_name.as_deref())?;
        let registry = Handle::<Registry>::new(&core, config.registry_version)?;

        let session = Box::new(Session::new(
            backend,
            main_loop.borrow(),
            core.borrow(),
            registry.borrow(),
            config,
            initial,
            Box::new(update),
        ));

        let mut hooks = HookTable::new();
        unsafe {
            hooks.push(core.attach(&session.core_events, session.as_data()));
            hooks.push(registry.attach(&session.registry_events, session.as_data()));
        }
        tracing::info!("instance ready");

        Ok(Instance {
            hooks,
            session,
            registry,
            core,
            context,
            main_loop,
            _library: PhantomData,
        })
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn main_loop(&self) -> &Handle<MainLoop> {
        &self.main_loop
    }

    pub fn context(&self) -> &Handle<Context> {
        &self.context
    }

    pub fn core(&self) -> &Handle<Core> {
        &self.core
    }

    pub fn registry(&self) -> &Handle<Registry> {
        &self.registry
    }
}

impl<S> Deref for Instance<'_, S> {
    type Target = Session<S>;

    fn deref(&self) -> &Session<S> {
        &self.session
    }
}

impl<S> fmt::Debug for Instance<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("hooks", &self.hooks.len())
            .field("session", &self.session)
            .field("main_loop", &self.main_loop)
            .finish()
    }
}

impl<S> Drop for Instance<'_, S> {
    fn drop(&mut self) {
        tracing::info!(hooks = self.hooks.len(), "tearing down instance");
    }
}

/// Run `body` against a fresh instance, then tear it down.
///
/// Teardown happens whether `body` returns or panics.
pub fn with_instance<S, F, B, R>(
    library: &Library,
    config: InstanceConfig,
    initial: S,
    update: F,
    body: B,
) -> TetherResult<R>
where
    S: Clone,
    F: FnMut(&Session<S>, RegistryEvent, S) -> S + 'static,
    B: FnOnce(&Instance<'_, S>) -> R,
{
    let instance = Instance::new(library, config, initial, update)?;
    Ok(body(&instance))
}
