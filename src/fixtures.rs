//! Sample bindable types registered with the discovery inventory
//!
//! Configuration assets refer to them by name: `ILogger`, `IAudio`,
//! `ConsoleLogger`, `NullLogger` and `Speaker`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tagbind_common::Tag;
use tagbind_di::{
    CatalogRegistration, DiResult, Destroyable, Implementation, InjectRequirement, Injectable,
    InjectionPlan, Initializable, TypeCatalog,
};

pub trait Logger {
    fn name(&self) -> &'static str;
    fn log(&self, message: &str);
}

pub trait Audio {
    fn play(&self, clip: &str);
}

thread_local! {
    static CONSOLE_LOGGERS_DESTROYED: Cell<u32> = const { Cell::new(0) };
}

/// Number of `ConsoleLogger`s torn down on this thread
pub fn console_loggers_destroyed() -> u32 {
    CONSOLE_LOGGERS_DESTROYED.with(Cell::get)
}

#[derive(Default)]
pub struct ConsoleLogger {
    created: Cell<u32>,
    lines: RefCell<Vec<String>>,
}

impl ConsoleLogger {
    pub fn created(&self) -> u32 {
        self.created.get()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl Logger for ConsoleLogger {
    fn name(&self) -> &'static str {
        "console"
    }

    fn log(&self, message: &str) {
        tracing::info!(target: "console_logger", "{}", message);
        self.lines.borrow_mut().push(message.to_string());
    }
}

impl Initializable for ConsoleLogger {
    fn on_created(&self) {
        self.created.set(self.created.get() + 1);
    }
}

impl Destroyable for ConsoleLogger {
    fn on_destroyed(&self) {
        CONSOLE_LOGGERS_DESTROYED.with(|count| count.set(count.get() + 1));
    }
}

#[derive(Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn name(&self) -> &'static str {
        "null"
    }

    fn log(&self, _message: &str) {}
}

/// Plays clips through whatever logger its scope resolves
pub struct Speaker {
    logger: Option<Rc<dyn Logger>>,
}

impl Speaker {
    pub fn logger(&self) -> Option<&Rc<dyn Logger>> {
        self.logger.as_ref()
    }
}

impl Audio for Speaker {
    fn play(&self, clip: &str) {
        if let Some(logger) = &self.logger {
            logger.log(&format!("playing {}", clip));
        }
    }
}

/// Consumer with two required injected fields
#[derive(Default)]
pub struct Player {
    pub logger: Option<Rc<dyn Logger>>,
    pub audio: Option<Rc<dyn Audio>>,
}

impl Injectable for Player {
    fn injection_plan() -> InjectionPlan<Self> {
        InjectionPlan::builder()
            .inject::<dyn Logger>("logger", InjectRequirement::required(), |p: &mut Player| {
                &mut p.logger
            })
            .inject::<dyn Audio>("audio", InjectRequirement::required(), |p: &mut Player| {
                &mut p.audio
            })
            .build()
    }
}

fn register(catalog: &mut TypeCatalog) -> DiResult<()> {
    catalog.register(
        Implementation::builder::<ConsoleLogger>("ConsoleLogger")
            .provides::<dyn Logger>(|l| l as Rc<dyn Logger>)
            .initializable()
            .destroyable()
            .factory(|_| ConsoleLogger::default())
            .build(),
    )?;
    catalog.register(
        Implementation::builder::<NullLogger>("NullLogger")
            .provides::<dyn Logger>(|l| l as Rc<dyn Logger>)
            .factory(|_| NullLogger)
            .build(),
    )?;
    catalog.register(
        Implementation::builder::<Speaker>("Speaker")
            .provides::<dyn Audio>(|s| s as Rc<dyn Audio>)
            .factory(|resolver| Speaker {
                logger: resolver.resolve::<dyn Logger>(Tag::NONE),
            })
            .build(),
    )?;
    catalog.alias::<dyn Logger>("ILogger").alias::<dyn Audio>("IAudio");
    Ok(())
}

inventory::submit! {
    CatalogRegistration::new("fixtures", register)
}
