//! Line-driven host shell.
//!
//! Owns the root lifecycle: restores the last snapshot, drives the root to
//! resumed, feeds commands to the component tree and saves on exit.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use wayfinder::core::config::ResolvedConfig;
use wayfinder::core::persistence::{self, FileSink};
use wayfinder::essentials::{LifecycleState, SavedState};
use wayfinder::router::stack::DEFAULT_STACK_KEY;
use wayfinder::router::{
    ChildStack, PersistenceSink, StackNavigation, StackNavigator, StackOptions, child_stack,
};
use wayfinder::sample::{ArticleDatabase, InMemoryArticleDatabase, MultiPaneComponent};
use wayfinder::value::Value;
use wayfinder::{ComponentContext, DefaultRoot, NavigationError};

const ROOT_SNAPSHOT: &str = "root";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Screen {
    Articles,
    About,
}

enum ScreenComponent {
    Articles(MultiPaneComponent),
    About,
}

#[derive(Debug, PartialEq)]
enum Command {
    Open(u64),
    Close,
    Multi(bool),
    Back,
    About,
    Pop,
    Show,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(word) => word,
        None => return Err("empty command".to_string()),
    };
    let argument = words.next();

    match (command, argument) {
        ("open", Some(id)) => id
            .parse()
            .map(Command::Open)
            .map_err(|_| format!("not an article id: {id}")),
        ("open", None) => Err("usage: open <id>".to_string()),
        ("close", None) => Ok(Command::Close),
        ("multi", Some("on")) => Ok(Command::Multi(true)),
        ("multi", Some("off")) => Ok(Command::Multi(false)),
        ("multi", _) => Err("usage: multi on|off".to_string()),
        ("back", None) => Ok(Command::Back),
        ("about", None) => Ok(Command::About),
        ("pop", None) => Ok(Command::Pop),
        ("show", None) => Ok(Command::Show),
        ("help", None) => Ok(Command::Help),
        ("quit" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("unknown command: {}", line.trim())),
    }
}

const HELP: &str = "\
commands:
  open <id>     open an article
  close         close the open article
  multi on|off  switch between single and multi-pane layout
  back          deliver a back press
  about         show the about screen
  pop           pop the top screen
  show          print the component tree
  quit          save and exit";

struct Shell {
    root: DefaultRoot,
    navigation: StackNavigation<Screen>,
    stack: Value<ChildStack<Screen, ScreenComponent>>,
}

impl Shell {
    fn new(config: &ResolvedConfig, saved: Option<SavedState>) -> Result<Self, NavigationError> {
        let root = DefaultRoot::new(saved);
        let navigation = StackNavigation::new();
        let database: Rc<dyn ArticleDatabase> = Rc::new(InMemoryArticleDatabase::default());
        let multi_pane = config.multi_pane;

        let mut options = StackOptions::new(
            &navigation,
            || vec![Screen::Articles],
            config.pop_policy,
            move |screen: Screen, ctx: ComponentContext| match screen {
                Screen::Articles => {
                    let component =
                        MultiPaneComponent::new(&ctx, Rc::clone(&database), multi_pane, None)?;
                    Ok(ScreenComponent::Articles(component))
                }
                Screen::About => Ok(ScreenComponent::About),
            },
        )
        .with_back_button(config.handle_back_button);
        if config.persistence_enabled && config.save_on_publish {
            let sink: Rc<dyn PersistenceSink> = Rc::new(FileSink::new(&config.state_dir));
            options = options.with_sink(sink);
        }

        let stack = child_stack(&root.context(), options)?;
        root.lifecycle.drive_to(LifecycleState::Resumed);

        Ok(Self {
            root,
            navigation,
            stack,
        })
    }

    fn with_articles(
        &self,
        f: impl FnOnce(&MultiPaneComponent) -> Result<(), NavigationError>,
    ) -> Result<(), String> {
        let stack = self.stack.value();
        match &*stack.active.instance {
            ScreenComponent::Articles(component) => f(component).map_err(|e| e.to_string()),
            ScreenComponent::About => Err("the article list is not on top".to_string()),
        }
    }

    fn execute(&self, command: Command) -> Result<(), String> {
        match command {
            Command::Open(id) => self.with_articles(|c| c.show_details(id)),
            Command::Close => self.with_articles(|c| c.close_details()),
            Command::Multi(on) => self.with_articles(|c| c.set_multi_pane(on)),
            Command::Back => {
                if !self.root.back_dispatcher.back() {
                    println!("(nothing handled back)");
                }
                Ok(())
            }
            Command::About => self
                .navigation
                .bring_to_front(Screen::About)
                .map_err(|e| e.to_string()),
            Command::Pop => self.navigation.pop().map_err(|e| e.to_string()),
            Command::Show => {
                println!("{}", self.render());
                Ok(())
            }
            Command::Help => {
                println!("{HELP}");
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    fn render(&self) -> String {
        let stack = self.stack.value();
        let mut lines = Vec::new();
        for (depth, item) in stack.items().iter().enumerate() {
            let marker = if depth + 1 == stack.len() { '*' } else { ' ' };
            lines.push(format!("{marker} {:?}", item.configuration));
        }

        if let ScreenComponent::Articles(component) = &*stack.active.instance {
            let panes = component.children().value();
            if let Some(list) = panes.list() {
                lines.push(format!(
                    "  list [{:?}] {} articles, toolbar {}, selected {:?}",
                    list.lifecycle().state(),
                    list.articles().len(),
                    if list.is_toolbar_visible() { "shown" } else { "hidden" },
                    list.selected_article_id(),
                ));
            }
            if let Some(details) = panes.details() {
                let article = details.article();
                lines.push(format!(
                    "  details [{:?}] #{} {}",
                    details.lifecycle().state(),
                    article.id,
                    article.title
                ));
                lines.push(format!("    {}", article.text));
            }
            lines.push(format!(
                "  layout: {}",
                if panes.is_multi_pane { "multi-pane" } else { "single-pane" }
            ));
        }
        lines.join("\n")
    }

    fn save(&self) -> SavedState {
        self.root.save()
    }

    fn finish(&self) {
        self.root.finish();
    }
}

/// Prefers the snapshot written on a clean exit; falls back to the last
/// save-on-publish file, which has the same shape.
fn restore(state_dir: &Path) -> Option<SavedState> {
    let mut found = None;
    for name in [ROOT_SNAPSHOT, DEFAULT_STACK_KEY] {
        match persistence::take_snapshot(state_dir, name) {
            Ok(Some(state)) if found.is_none() => found = Some(state),
            Ok(_) => {}
            Err(e) => warn!("Could not read snapshot '{}': {}", name, e),
        }
    }
    found
}

pub fn run(config: ResolvedConfig) -> io::Result<()> {
    let saved = if config.persistence_enabled {
        restore(&config.state_dir)
    } else {
        None
    };
    if saved.is_some() {
        println!("Restored previous session.");
    }

    let shell = Shell::new(&config, saved).map_err(|e| io::Error::other(e.to_string()))?;
    println!("{HELP}");
    println!("{}", shell.render());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("> ");
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => match shell.execute(command) {
                Ok(()) => println!("{}", shell.render()),
                Err(e) => println!("error: {e}"),
            },
            Err(e) => println!("{e}"),
        }
    }

    if config.persistence_enabled {
        let path = persistence::save_snapshot(&config.state_dir, ROOT_SNAPSHOT, &shell.save())?;
        persistence::discard_snapshot(&config.state_dir, DEFAULT_STACK_KEY)?;
        info!("Session saved to {}", path.display());
    }
    shell.finish();
    Ok(())
}
