//! Line-oriented front end over the [`Navigator`].
//!
//! The shell plays the part of the presentation layer: it subscribes to
//! state updates, keeps the modal back/forward history and renders every
//! result as plain text lines.

use std::sync::mpsc;
use std::sync::Arc;

use oceannav_core::{try_decode, AppState, MapCommand, OptionsPatch, StatePatch};
use oceannav_sync::{CatalogClient, ModalClose, Navigator};
use tracing::{debug, info, warn};

use crate::commands::{Command, SubsetArgs, HELP};
use crate::error::Result;
use crate::history::{HistoryEntry, ModalHistory};
use crate::preferences::ShellPreferences;

/// Output of one command.
#[derive(Debug, Default, PartialEq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn line(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            quit: false,
        }
    }
}

pub struct Shell<C> {
    nav: Navigator<C>,
    history: ModalHistory,
    prefs: ShellPreferences,
    updates: mpsc::Receiver<Arc<AppState>>,
}

impl<C: CatalogClient> Shell<C> {
    /// Build a shell, apply the preferred options, restore `link` (or the
    /// remembered one) and load the catalog lists.
    pub async fn start(catalog: C, prefs: ShellPreferences, link: Option<&str>) -> Self {
        let nav = Navigator::new(catalog);
        let updates = nav.subscribe();
        let mut shell = Self {
            nav,
            history: ModalHistory::new(prefs.history_limit),
            prefs,
            updates,
        };

        let options = shell.prefs.options_patch();
        if let Err(e) = shell
            .nav
            .apply(StatePatch {
                options: Some(options),
                ..StatePatch::default()
            })
            .await
        {
            warn!("Failed to apply preferred options: {e}");
        }

        let link = link
            .map(str::to_string)
            .or_else(|| shell.prefs.startup_link().map(str::to_string));
        if let Some(link) = link {
            info!("Restoring link");
            shell.nav.restore_permalink(&link);
        }

        shell.nav.bootstrap().await;
        shell.drain_updates();
        shell
    }

    pub fn navigator(&self) -> &Navigator<C> {
        &self.nav
    }

    pub fn preferences(&self) -> &ShellPreferences {
        &self.prefs
    }

    /// Parse and run one input line.
    pub async fn execute_line(&mut self, line: &str) -> Result<Reply> {
        let command: Command = line.parse()?;
        self.execute(command).await
    }

    pub async fn execute(&mut self, command: Command) -> Result<Reply> {
        debug!(?command, "Executing");
        let reply = match command {
            Command::Set(pairs) => {
                let state = self.nav.apply_pairs(pairs).await?;
                Reply::line(summary(&state))
            }
            Command::Patch(patch) => {
                let state = self.nav.apply(patch).await?;
                Reply::line(summary(&state))
            }
            Command::Dataset(id) => {
                let state = self.nav.apply(StatePatch::dataset(id)).await?;
                Reply::line(summary(&state))
            }
            Command::Swap => Reply::line(summary(&self.nav.swap())),
            Command::Action { name, arg } => {
                let commands = self.nav.dispatch_named(&name, arg);
                let mut lines: Vec<String> = commands.iter().map(describe_command).collect();
                lines.push(summary(&self.nav.snapshot()));
                Reply { lines, quit: false }
            }
            Command::Options(patch) => Reply::line(options_line(&self.nav.update_options(patch))),
            Command::RevertOptions => Reply::line(options_line(&self.nav.revert_options())),
            Command::Link(flags) => {
                let url = self.nav.permalink(&flags, &self.prefs.permalink_base);
                self.prefs.last_link = Some(url.clone());
                Reply::line(url)
            }
            Command::Open(url) => {
                try_decode(&url)?;
                let state = self.nav.restore_permalink(&url);
                self.prefs.last_link = Some(url);
                Reply::line(summary(&state))
            }
            Command::Close => match self.nav.close_modal() {
                ModalClose::Dismissed => Reply::line("modal closed"),
                ModalClose::NavigateBack => self.back(),
            },
            Command::Back => self.back(),
            Command::Forward => match self.history.forward() {
                Some(_) => Reply::line(self.history_line()),
                None => Reply::line("nothing to go forward to"),
            },
            Command::Subset(args) => self.subset(args)?,
            Command::State => {
                Reply::line(serde_json::to_string_pretty(&*self.nav.snapshot())?)
            }
            Command::Help => Reply {
                lines: HELP.lines().map(str::to_string).collect(),
                quit: false,
            },
            Command::Quit => Reply {
                lines: Vec::new(),
                quit: true,
            },
        };
        self.drain_updates();
        Ok(reply)
    }

    fn back(&mut self) -> Reply {
        match self.history.back() {
            Some(HistoryEntry::PreModal) => {
                self.nav.hide_modal();
                Reply::line("modal hidden")
            }
            Some(_) => Reply::line(self.history_line()),
            None => Reply::line("nothing to go back to"),
        }
    }

    fn history_line(&self) -> String {
        format!("history {}/{}", self.history.position() + 1, self.history.len())
    }

    fn subset(&self, args: SubsetArgs) -> Result<Reply> {
        let mut request = self.nav.subset_request(args.area);
        request.variables = args.variables;
        request.output_format = args.output_format;
        request.time_range = args.time_range;
        request.zip = args.zip;
        Ok(Reply {
            lines: vec![
                request.subset_url()?,
                request.script_url(&self.prefs.script_origin, args.lang)?,
            ],
            quit: false,
        })
    }

    /// Feed published states to the modal history.
    fn drain_updates(&mut self) {
        for state in self.updates.try_iter() {
            self.history.observe(&state);
        }
    }
}

fn summary(state: &AppState) -> String {
    let view = |v: &oceannav_core::ViewState| {
        format!(
            "{}/{} depth={} time={}..{} scale={}",
            v.dataset, v.variable, v.depth, v.starttime, v.time, v.scale
        )
    };
    let mut line = format!("primary {}", view(state.primary()));
    if state.views.dataset_compare {
        line.push_str(&format!(" | secondary {}", view(state.secondary())));
    }
    if state.ui.show_modal {
        let title = state.selection.as_ref().map(|s| s.title()).unwrap_or_default();
        line.push_str(&format!(" | modal {title}"));
    }
    if state.busy {
        line.push_str(" | busy");
    }
    line
}

fn options_line(state: &AppState) -> String {
    match serde_json::to_string(&OptionsPatch::from_options(&state.options)) {
        Ok(json) => format!("options {json}"),
        Err(e) => format!("options unavailable: {e}"),
    }
}

fn describe_command(command: &MapCommand) -> String {
    match command {
        MapCommand::Arm { mode, target } => format!("map {target:?}: arm {mode:?}"),
        MapCommand::Disarm { mode, target } => format!("map {target:?}: disarm {mode:?}"),
        MapCommand::Show { layer, id, target } => format!("map {target:?}: show {layer} {id}"),
        MapCommand::Add {
            kind, id, target, ..
        } => format!("map {target:?}: add {kind} {id}"),
        MapCommand::Reset { target } => format!("map {target:?}: reset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use futures::executor::block_on;
    use oceannav_sync::InMemoryCatalog;
    use pretty_assertions::assert_eq;

    const DAY: i64 = 86_400;
    const FIRST: i64 = 2_208_988_800;

    fn shell() -> Shell<InMemoryCatalog> {
        shell_with(ShellPreferences::default(), None)
    }

    fn shell_with(prefs: ShellPreferences, link: Option<&str>) -> Shell<InMemoryCatalog> {
        let catalog = InMemoryCatalog::from_json(include_str!("../catalog.json")).unwrap();
        block_on(Shell::start(catalog, prefs, link))
    }

    fn run(shell: &mut Shell<InMemoryCatalog>, line: &str) -> Reply {
        block_on(shell.execute_line(line)).unwrap()
    }

    #[test]
    fn startup_resolves_the_latest_window() {
        let shell = shell();
        let state = shell.navigator().snapshot();
        assert_eq!(state.available_datasets.len(), 3);
        assert_eq!(state.primary().starttime, FIRST);
        assert_eq!(state.primary().time, FIRST + 39 * DAY);
        assert!(!state.busy);
    }

    #[test]
    fn dataset_command_runs_the_cascade() {
        let mut shell = shell();
        run(&mut shell, "dataset riops_daily");
        let state = shell.navigator().snapshot();
        assert_eq!(state.primary().variable.as_str(), "vosaline");
        assert_eq!(state.primary().starttime, FIRST + 5 * DAY);
        assert_eq!(state.primary().time, FIRST + 29 * DAY);
    }

    #[test]
    fn failed_dataset_change_is_reported() {
        let mut shell = shell();
        let result = block_on(shell.execute_line("dataset nowhere"));
        assert!(matches!(result, Err(AppError::Sync(_))));
        assert!(!shell.navigator().snapshot().busy);
    }

    #[test]
    fn link_then_open_restores_settings() {
        let mut shell = shell();
        run(&mut shell, "set depth 7");
        let link = run(&mut shell, "link").lines.remove(0);
        assert!(link.starts_with("https://navigator.oceansdata.ca/public/?query="));
        assert_eq!(shell.preferences().last_link.as_deref(), Some(link.as_str()));

        let mut other = shell_with(ShellPreferences::default(), Some(&link));
        assert_eq!(other.navigator().snapshot().primary().depth, 7);
        run(&mut other, "set depth 0");
        run(&mut other, &format!("open {link}"));
        assert_eq!(other.navigator().snapshot().primary().depth, 7);
    }

    #[test]
    fn open_rejects_malformed_links() {
        let mut shell = shell();
        let result = block_on(shell.execute_line("open ?query=%7B"));
        assert!(matches!(result, Err(AppError::Core(_))));
        assert_eq!(shell.preferences().last_link, None);
    }

    #[test]
    fn back_after_opening_a_point_hides_the_modal() {
        let mut shell = shell();
        let reply = run(&mut shell, "action point [-63.5, 44.6]");
        assert!(shell.navigator().snapshot().ui.show_modal);
        assert!(reply.lines.last().unwrap().contains("modal 44.6000 N, 63.5000 W"));

        assert_eq!(run(&mut shell, "back").lines, vec!["modal hidden"]);
        let state = shell.navigator().snapshot();
        assert!(!state.ui.show_modal);
        assert!(state.selection.is_none());
        assert_eq!(run(&mut shell, "back").lines, vec!["nothing to go back to"]);
    }

    #[test]
    fn close_without_pending_link_goes_back() {
        let mut shell = shell();
        run(&mut shell, "action point [-63.5, 44.6]");
        assert_eq!(run(&mut shell, "close").lines, vec!["modal hidden"]);
        assert!(!shell.navigator().snapshot().ui.show_modal);
    }

    #[test]
    fn options_update_and_revert() {
        let mut shell = shell();
        run(&mut shell, r#"options {"bathymetry": false}"#);
        assert!(!shell.navigator().snapshot().options.bathymetry);
        run(&mut shell, "options revert");
        assert!(shell.navigator().snapshot().options.bathymetry);
    }

    #[test]
    fn preferred_options_apply_at_startup() {
        let mut prefs = ShellPreferences::default();
        prefs.default_options.interp_radius = 40;
        let shell = shell_with(prefs, None);
        assert_eq!(shell.navigator().snapshot().options.interp_radius, 40);
    }

    #[test]
    fn subset_prints_both_urls() {
        let mut shell = shell();
        let reply = run(
            &mut shell,
            r#"subset {"area": [[40, -60], [45, -50]], "variables": ["votemper"]}"#,
        );
        assert_eq!(reply.lines.len(), 2);
        assert!(reply.lines[0].starts_with("/api/v2.0/subset/giops_day/votemper?"));
        assert!(reply.lines[0].contains("&min_range=40,-60&max_range=45,-50"));
        assert!(reply.lines[1].ends_with("&lang=python&scriptType=subset"));
    }

    #[test]
    fn swap_and_quit() {
        let mut shell = shell();
        run(&mut shell, "set dataset_compare true");
        assert!(shell.navigator().snapshot().secondary().time_window_resolved());
        run(&mut shell, "set depth 3");
        run(&mut shell, "swap");
        let state = shell.navigator().snapshot();
        assert_eq!(state.primary().depth, 0);
        assert_eq!(state.secondary().depth, 3);
        assert!(run(&mut shell, "quit").quit);
    }
}
