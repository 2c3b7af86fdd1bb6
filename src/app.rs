//! Application orchestration
//!
//! Ties the configuration store, the system participants and the command-set
//! loaders to one periodic tick. Nothing in here is fatal to the process:
//! failures are logged and the next tick tries again.

use crate::command::directories::DirectoryConfig;
use crate::command::tree::{CommandTree, CommandTreeUpdater};
use crate::command::{CommandSetLoader, DirectoryLoader, PassReport};
use crate::config::{ConfigError, ConfigStore};
use crate::console::LogConsole;
use crate::environment::Environment;
use crate::extension::Extensions;
use crate::system::{EngineParticipant, SystemParticipant};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Default polling period of the main loop
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// What one tick did
#[derive(Debug, Default)]
pub struct TickReport {
    pub config_changed: bool,
    pub passes: Vec<PassReport>,
    /// Errors logged during the tick
    pub failures: usize,
}

pub struct Application {
    config: ConfigStore,
    env: Rc<Environment>,
    participants: Extensions<RefCell<dyn SystemParticipant>>,
    loaders: Extensions<RefCell<dyn CommandSetLoader>>,
    tree: Rc<CommandTreeUpdater>,
    console: Option<LogConsole>,
}

impl Application {
    /// Application with no participants or loaders registered
    pub fn new(config: ConfigStore, env: Rc<Environment>) -> Self {
        let tree = Rc::new(CommandTreeUpdater::new(env.registry().clone()));
        env.observers().register(tree.clone());

        Self {
            config,
            env,
            participants: Extensions::new(),
            loaders: Extensions::new(),
            tree,
            console: None,
        }
    }

    /// Speech engine participant plus the directory loader
    ///
    /// Relative directory lines resolve against the config file's directory.
    pub fn with_defaults(mut config: ConfigStore, env: Rc<Environment>) -> Self {
        let directories = match config.get_config_path().parent() {
            Some(base) => DirectoryConfig::with_base(base),
            None => DirectoryConfig::new(),
        };

        let app = Self::new(config, env);
        app.register_participant(Rc::new(RefCell::new(EngineParticipant::new())));

        let loader = Rc::new(RefCell::new(DirectoryLoader::with_directories(directories)));
        app.register_participant(loader.clone());
        app.register_loader(loader);
        app
    }

    pub fn register_participant(&self, participant: Rc<RefCell<dyn SystemParticipant>>) -> bool {
        self.participants.register(participant)
    }

    pub fn register_loader(&self, loader: Rc<RefCell<dyn CommandSetLoader>>) -> bool {
        self.loaders.register(loader)
    }

    /// Route the log console through this application's tick
    pub fn attach_console(&mut self, console: LogConsole) {
        self.console = Some(console);
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    pub fn console(&self) -> Option<&LogConsole> {
        self.console.as_ref()
    }

    /// Current command tree
    pub fn command_tree(&self) -> CommandTree {
        self.tree.tree()
    }

    pub fn startup(&mut self) {
        if !self.config.is_loaded() {
            if let Err(e) = self.config.load_or_create() {
                log::error!("Failed to load configuration: {}", e);
            }
        }

        let config = self.config.config().clone();
        for participant in self.participants.snapshot() {
            let mut participant = participant.borrow_mut();
            if let Err(e) = participant.startup(&self.env, &config) {
                log::error!("Failed to start {}: {:#}", participant.name(), e);
            }
        }
        log::info!("✓ Startup complete");
    }

    /// One iteration of the main loop
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        match self.config.reload_if_modified() {
            Ok(changed) => report.config_changed = changed,
            Err(e @ ConfigError::Parse { .. }) => {
                // Defaults are in effect now
                log::error!("{}; using default configuration", e);
                report.config_changed = true;
                report.failures += 1;
            }
            Err(e) => {
                log::error!("Failed to reload configuration: {}", e);
                report.failures += 1;
            }
        }

        let config = self.config.config().clone();
        if report.config_changed {
            for participant in self.participants.snapshot() {
                let mut participant = participant.borrow_mut();
                if let Err(e) = participant.config_changed(&self.env, &config) {
                    log::error!("{} failed to apply configuration: {:#}", participant.name(), e);
                    report.failures += 1;
                }
            }
        }

        for loader in self.loaders.snapshot() {
            match loader.borrow_mut().update(&self.env, &config) {
                Ok(pass) => report.passes.push(pass),
                Err(e) => {
                    log::error!("Command module update aborted: {}", e);
                    report.failures += 1;
                }
            }
        }

        if self.tree.take_dirty() {
            log::debug!("Command tree:\n{}", self.tree.tree().render());
        }

        if let Some(console) = &mut self.console {
            console.drain();
        }

        report
    }

    pub fn shutdown(&mut self) {
        log::info!("Shutting down...");
        for participant in self.participants.snapshot() {
            participant.borrow_mut().shutdown(&self.env);
        }

        if let Some(console) = &mut self.console {
            console.drain();
            if let Some(path) = &self.config.config().logging.export_path {
                if let Err(e) = console.export_csv(path) {
                    log::error!("Failed to export log console: {:#}", e);
                }
            }
        }

        self.env.shutdown();
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("env", &self.env)
            .field("participants", &self.participants)
            .field("loaders", &self.loaders)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ConfigLocations};
    use crate::testing::{fake_env, write_module};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    fn store_at(dir: &Path) -> (ConfigStore, PathBuf) {
        let path = dir.join("config").join("voxshell.toml");
        let store = ConfigStore::new(ConfigLocations {
            local: None,
            system: path.clone(),
        });
        (store, path)
    }

    /// Rewrite the config file and push its mtime forward
    fn rewrite_config(path: &Path, config: &AppConfig, bump_secs: u64) {
        fs::write(path, toml::to_string_pretty(config).expect("serialize")).expect("write");
        let file = fs::File::options().write(true).open(path).expect("open");
        file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
            .expect("set mtime");
    }

    fn loader_app(store: ConfigStore) -> (Application, Rc<RefCell<crate::testing::FakeState>>) {
        let (env, host) = fake_env();
        let app = Application::new(store, env);
        let loader = Rc::new(RefCell::new(DirectoryLoader::new()));
        app.register_participant(loader.clone());
        app.register_loader(loader);
        (app, host)
    }

    #[test]
    fn test_startup_creates_config() {
        let td = tempfile::tempdir().expect("tempdir");
        let (store, path) = store_at(td.path());
        let (mut app, _) = loader_app(store);

        app.startup();
        assert!(path.is_file());
        assert_eq!(app.command_tree(), CommandTree::NothingLoaded);
    }

    #[test]
    fn test_tick_loads_and_config_change_unloads() {
        let td = tempfile::tempdir().expect("tempdir");
        let modules = td.path().join("modules");
        fs::create_dir(&modules).expect("mkdir");
        write_module(&modules, "hello.py", "x = 1\n");

        let (store, path) = store_at(td.path());
        let (mut app, host) = loader_app(store);
        app.startup();

        let mut config = AppConfig::default();
        config.loader.directories = modules.display().to_string();
        rewrite_config(&path, &config, 5);

        let report = app.tick();
        assert!(report.config_changed);
        assert_eq!(report.passes[0].loaded.len(), 1);
        assert_eq!(
            app.command_tree().render(),
            "Command sets\n  hello.py (legacy)\n"
        );

        // Quiet tick
        let report = app.tick();
        assert!(!report.config_changed);
        assert!(report.passes[0].is_quiet());

        config.loader.directories = String::new();
        rewrite_config(&path, &config, 10);
        let report = app.tick();
        assert_eq!(report.passes[0].unloaded.len(), 1);
        assert_eq!(host.borrow().live_units(), 0);
        assert_eq!(app.command_tree(), CommandTree::NothingLoaded);
    }

    #[test]
    fn test_broken_config_degrades_to_defaults_once() {
        let td = tempfile::tempdir().expect("tempdir");
        let (store, path) = store_at(td.path());
        let (mut app, _) = loader_app(store);
        app.startup();

        fs::write(&path, "[loader\nbroken").expect("write");
        let file = fs::File::options().write(true).open(&path).expect("open");
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .expect("set mtime");

        let report = app.tick();
        assert!(report.config_changed);
        assert_eq!(report.failures, 1);
        assert_eq!(app.config().config(), &AppConfig::default());

        let report = app.tick();
        assert_eq!(report.failures, 0);
    }

    #[test]
    fn test_host_failure_is_contained_per_tick() {
        let td = tempfile::tempdir().expect("tempdir");
        let modules = td.path().join("modules");
        fs::create_dir(&modules).expect("mkdir");
        write_module(&modules, "a.py", "x = 1\n");

        let (mut store, _) = store_at(td.path());
        let mut config = AppConfig::default();
        config.loader.directories = modules.display().to_string();
        store.set_config(config);
        store.save().expect("save");

        let (mut app, host) = loader_app(store);
        app.startup();

        host.borrow_mut().unavailable = true;
        assert_eq!(app.tick().failures, 1);

        host.borrow_mut().unavailable = false;
        let report = app.tick();
        assert_eq!(report.failures, 0);
        assert_eq!(report.passes[0].loaded.len(), 1);
    }

    #[test]
    fn test_shutdown_unloads_and_exports_console() {
        let td = tempfile::tempdir().expect("tempdir");
        let modules = td.path().join("modules");
        fs::create_dir(&modules).expect("mkdir");
        write_module(&modules, "a.py", "def unload():\n    pass\n");
        let export = td.path().join("console.csv");

        let (mut store, _) = store_at(td.path());
        let mut config = AppConfig::default();
        config.loader.directories = modules.display().to_string();
        config.logging.export_path = Some(export.clone());
        store.set_config(config);
        store.save().expect("save");

        let (mut app, host) = loader_app(store);
        let (tx, console) = crate::console::channel(10);
        app.attach_console(console);
        app.startup();
        app.tick();
        assert_eq!(host.borrow().live_units(), 1);

        tx.send(crate::console::ConsoleRecord::new(log::Level::Info, "test", "bye"));
        app.shutdown();
        assert_eq!(host.borrow().live_units(), 0);
        assert_eq!(host.borrow().shutdowns, 1);
        let csv = fs::read_to_string(&export).expect("exported");
        assert!(csv.contains(",INFO,test,bye"));
    }

    #[test]
    fn test_relative_directories_follow_config_file() {
        let td = tempfile::tempdir().expect("tempdir");
        let (mut store, path) = store_at(td.path());
        let modules = td.path().join("config").join("commands");
        fs::create_dir_all(&modules).expect("mkdir");
        write_module(&modules, "rel.py", "x = 1\n");

        let mut config = AppConfig::default();
        config.loader.directories = "commands\n".to_string();
        store.set_config(config);
        store.save().expect("save");
        assert!(path.is_file());

        let (env, _) = fake_env();
        let mut app = Application::with_defaults(store, env);
        app.startup();
        let report = app.tick();
        assert_eq!(report.passes[0].loaded, vec![modules.join("rel.py")]);
    }

    #[test]
    fn test_with_defaults_starts_stub_engine() {
        let td = tempfile::tempdir().expect("tempdir");
        let (store, _) = store_at(td.path());
        let (env, _) = fake_env();
        let mut app = Application::with_defaults(store, env);

        app.startup();
        let report = app.tick();
        assert_eq!(report.failures, 0);
        assert_eq!(report.passes.len(), 1);
        app.shutdown();
    }
}
