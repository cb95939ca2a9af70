use super::{Module, ModuleContext, ModulesList};
use crate::config::{Configuration, SetOptions};
use crate::error::{Result, SwitchyardError};
use crate::events::Events;
use crate::routing::Router;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration key of the persisted `id -> active` map.
pub const MODULES_KEY: &str = "modules";

/// Whether an activation change is written to the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Current request only.
    Transient,
    Persisted,
}

/// Result of [`ModulesContainer::enable`] / [`ModulesContainer::disable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Enabled,
    Disabled,
    AlreadyEnabled,
    AlreadyDisabled,
    NotFound,
    /// The module refused the change.
    Pinned,
}

/// Serializes writes of the persisted module map across every request of a
/// process. Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct StateLock(Arc<Mutex<()>>);

impl StateLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The modules of one request, in declaration order.
pub struct ModulesContainer {
    modules: Vec<Arc<dyn Module>>,
    config: Configuration,
    lock: StateLock,
}

#[cfg(test)]
impl std::fmt::Debug for ModulesContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModulesContainer")
            .field("modules", &self.modules.len())
            .finish_non_exhaustive()
    }
}

impl ModulesContainer {
    /// A container without modules.
    pub fn empty(config: Configuration) -> Self {
        Self {
            modules: Vec::new(),
            config,
            lock: StateLock::new(),
        }
    }

    /// Instantiates `list`, restores the persisted activation state and runs
    /// every module's `on_start`.
    ///
    /// Without a persisted state every module is active and that state is
    /// saved right away. `lock` must be shared by every container writing to
    /// the same store.
    pub fn start(
        list: &ModulesList,
        router: &mut Router,
        events: &Events,
        config: &Configuration,
        lock: &StateLock,
    ) -> Result<Self> {
        let modules = list.instantiate();

        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.id().to_string()) {
                return Err(SwitchyardError::DuplicateModule {
                    id: module.id().to_string(),
                });
            }
        }

        let container = Self {
            modules,
            config: config.clone(),
            lock: lock.clone(),
        };

        let persisted = config
            .get_as::<BTreeMap<String, bool>>(MODULES_KEY)?
            .filter(|state| !state.is_empty());
        match &persisted {
            Some(state) => {
                for module in &container.modules {
                    module.set_active_state(state.get(module.id()).copied().unwrap_or(true));
                }
            }
            None => {
                for module in &container.modules {
                    module.set_active_state(true);
                }
            }
        }

        for module in &container.modules {
            let mut ctx = ModuleContext::new(module.clone(), router, events, config);
            module.on_start(&mut ctx)?;
        }

        if persisted.is_none() {
            container.save_defaults()?;
        }

        tracing::debug!(active = ?container.active_ids(), "Modules started");
        Ok(container)
    }

    /// Module registered under `id`.
    pub fn find(&self, id: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.id() == id)
    }

    /// Like [`ModulesContainer::find`], failing with
    /// [`SwitchyardError::ModuleNotFound`].
    pub fn get(&self, id: &str) -> Result<&Arc<dyn Module>> {
        self.find(id)
            .ok_or_else(|| SwitchyardError::ModuleNotFound { id: id.to_string() })
    }

    /// Every module, active or not, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter()
    }

    /// Modules currently serving requests.
    pub fn active_modules(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter().filter(|module| module.is_active())
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.active_modules()
            .map(|module| module.id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Activates `id`. With [`Persistence::Persisted`] only this module's
    /// entry of the stored map is rewritten.
    pub fn enable(&self, id: &str, persistence: Persistence) -> Result<Activation> {
        self.transition(id, true, persistence)
    }

    /// Deactivates `id`; see [`ModulesContainer::enable`].
    pub fn disable(&self, id: &str, persistence: Persistence) -> Result<Activation> {
        self.transition(id, false, persistence)
    }

    /// Persists the activation flag of every module. Entries of modules this
    /// container does not know are kept.
    pub fn save_modules_state(&self) -> Result<()> {
        let _guard = self.lock.acquire();
        self.write_state(self.modules.iter())
    }

    /// Runs `on_finish` of every module. Failures are logged and do not stop
    /// the remaining modules.
    pub fn stop_modules(&self) {
        for module in &self.modules {
            if let Err(e) = module.on_finish() {
                tracing::error!("on_finish failed for module {}: {}", module.id(), e);
            }
        }
    }

    fn transition(&self, id: &str, active: bool, persistence: Persistence) -> Result<Activation> {
        let _guard = self.lock.acquire();

        let Some(module) = self.find(id) else {
            return Ok(Activation::NotFound);
        };
        if module.is_active() == active {
            return Ok(if active {
                Activation::AlreadyEnabled
            } else {
                Activation::AlreadyDisabled
            });
        }

        module.set_active_state(active);
        if module.is_active() != active {
            tracing::warn!(module = %id, active, "Module refused activation change");
            return Ok(Activation::Pinned);
        }

        if persistence == Persistence::Persisted {
            self.write_state(std::iter::once(module))?;
        }

        tracing::info!(module = %id, active, ?persistence, "Module activation changed");
        Ok(if active {
            Activation::Enabled
        } else {
            Activation::Disabled
        })
    }

    /// First deployment: saves every module as active unless a concurrent
    /// request stored a map in the meantime.
    fn save_defaults(&self) -> Result<()> {
        let _guard = self.lock.acquire();
        let stored = self.config.get_multiple(&[MODULES_KEY])?;
        if stored
            .get(MODULES_KEY)
            .and_then(|value| value.as_object())
            .is_some_and(|state| !state.is_empty())
        {
            return Ok(());
        }

        tracing::info!(modules = self.modules.len(), "No persisted module state, saving defaults");
        self.write_state(self.modules.iter())
    }

    /// Re-reads the stored map and overwrites the entries of `modules`.
    /// Callers hold `lock`.
    fn write_state<'m>(&self, modules: impl Iterator<Item = &'m Arc<dyn Module>>) -> Result<()> {
        let mut state = match self.config.get_multiple(&[MODULES_KEY])?.remove(MODULES_KEY) {
            Some(value) => serde_json::from_value::<BTreeMap<String, bool>>(value)?,
            None => BTreeMap::new(),
        };
        for module in modules {
            state.insert(module.id().to_string(), module.is_active());
        }
        self.config
            .set(MODULES_KEY, json!(state), SetOptions::persistent())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, MemoryStore};
    use crate::module::{BasicModule, ModuleState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn list(ids: &[&'static str]) -> ModulesList {
        ids.iter().fold(ModulesList::new(), |list, id| {
            list.with(*id, |id| BasicModule::new(id))
        })
    }

    fn start(list: &ModulesList, config: &Configuration) -> Result<ModulesContainer> {
        ModulesContainer::start(list, &mut Router::new(), &Events::new(), config, &StateLock::new())
    }

    fn persisted(store: &Arc<dyn ConfigStore>) -> BTreeMap<String, bool> {
        serde_json::from_value(store.fetch(MODULES_KEY).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn fresh_deployment_saves_everything_active() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let container = start(&list(&["a", "b"]), &Configuration::new(store.clone())).unwrap();

        assert_eq!(container.active_ids(), vec!["a", "b"]);
        assert_eq!(
            persisted(&store),
            BTreeMap::from([("a".to_string(), true), ("b".to_string(), true)])
        );
    }

    #[test]
    fn restores_persisted_state() {
        let config = Configuration::in_memory();
        config
            .set(MODULES_KEY, json!({"a": true, "b": false}), SetOptions::persistent())
            .unwrap();

        let container = start(&list(&["a", "b", "c"]), &config).unwrap();
        // unknown to the persisted map: active
        assert_eq!(container.active_ids(), vec!["a", "c"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = start(&list(&["a", "a"]), &Configuration::in_memory()).unwrap_err();
        assert!(matches!(err, SwitchyardError::DuplicateModule { id } if id == "a"));
    }

    #[test]
    fn persisted_transition_survives_the_request() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let modules = list(&["a", "b"]);

        let first = start(&modules, &Configuration::new(store.clone())).unwrap();
        assert_eq!(first.disable("b", Persistence::Persisted).unwrap(), Activation::Disabled);

        let second = start(&modules, &Configuration::new(store.clone())).unwrap();
        assert_eq!(second.active_ids(), vec!["a"]);
        assert_eq!(persisted(&store)["b"], false);
    }

    #[test]
    fn transient_transition_is_forgotten() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let modules = list(&["a", "b"]);

        let first = start(&modules, &Configuration::new(store.clone())).unwrap();
        assert_eq!(first.disable("b", Persistence::Transient).unwrap(), Activation::Disabled);
        assert_eq!(first.active_ids(), vec!["a"]);

        let second = start(&modules, &Configuration::new(store)).unwrap();
        assert_eq!(second.active_ids(), vec!["a", "b"]);
    }

    #[test]
    fn repeated_transitions_are_reported() {
        let container = start(&list(&["a"]), &Configuration::in_memory()).unwrap();

        assert_eq!(
            container.enable("a", Persistence::Persisted).unwrap(),
            Activation::AlreadyEnabled
        );
        assert_eq!(container.disable("a", Persistence::Transient).unwrap(), Activation::Disabled);
        assert_eq!(
            container.disable("a", Persistence::Transient).unwrap(),
            Activation::AlreadyDisabled
        );
        assert_eq!(
            container.enable("missing", Persistence::Persisted).unwrap(),
            Activation::NotFound
        );
    }

    #[test]
    fn stale_container_only_writes_its_own_transition() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let modules = list(&["a", "b", "c"]);
        let lock = StateLock::new();
        let start_shared = || {
            ModulesContainer::start(
                &modules,
                &mut Router::new(),
                &Events::new(),
                &Configuration::new(store.clone()),
                &lock,
            )
            .unwrap()
        };

        let first = start_shared();
        let second = start_shared();
        first.disable("b", Persistence::Persisted).unwrap();
        second.disable("c", Persistence::Persisted).unwrap();

        let state = persisted(&store);
        assert_eq!(state["a"], true);
        assert_eq!(state["b"], false);
        assert_eq!(state["c"], false);
    }

    #[test]
    fn save_keeps_unknown_entries() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        store
            .store(MODULES_KEY, json!({"a": false, "retired": false}), None)
            .unwrap();

        let container = start(&list(&["a", "b"]), &Configuration::new(store.clone())).unwrap();
        container.save_modules_state().unwrap();

        assert_eq!(
            persisted(&store),
            BTreeMap::from([
                ("a".to_string(), false),
                ("b".to_string(), true),
                ("retired".to_string(), false),
            ])
        );
    }

    #[test]
    fn get_reports_unknown_modules() {
        let container = start(&list(&["a"]), &Configuration::in_memory()).unwrap();

        assert_eq!(container.get("a").unwrap().id(), "a");
        assert!(matches!(
            container.get("zz"),
            Err(SwitchyardError::ModuleNotFound { id }) if id == "zz"
        ));
    }

    struct AlwaysOn {
        state: ModuleState,
    }

    impl Module for AlwaysOn {
        fn state(&self) -> &ModuleState {
            &self.state
        }

        fn set_active_state(&self, _active: bool) {}
    }

    #[test]
    fn pinned_module_keeps_its_state() {
        let modules = ModulesList::new().with("core", |id| AlwaysOn {
            state: ModuleState::new(id),
        });
        let container = start(&modules, &Configuration::in_memory()).unwrap();

        assert_eq!(
            container.disable("core", Persistence::Persisted).unwrap(),
            Activation::Pinned
        );
        assert!(container.find("core").unwrap().is_active());
    }

    static FINISHED: AtomicUsize = AtomicUsize::new(0);

    struct Counting {
        state: ModuleState,
    }

    impl Module for Counting {
        fn state(&self) -> &ModuleState {
            &self.state
        }

        fn on_finish(&self) -> Result<()> {
            FINISHED.fetch_add(1, Ordering::SeqCst);
            Err(SwitchyardError::Internal("flush failed".into()))
        }
    }

    #[test]
    fn stop_runs_every_on_finish() {
        let modules = ModulesList::new()
            .with("x", |id| Counting {
                state: ModuleState::new(id),
            })
            .with("y", |id| Counting {
                state: ModuleState::new(id),
            });
        let container = start(&modules, &Configuration::in_memory()).unwrap();

        container.stop_modules();
        assert_eq!(FINISHED.load(Ordering::SeqCst), 2);
    }
}
