pub mod filter;
pub mod grid;
pub mod request;
pub mod sort;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::client::{Counter, CountersApi, CountersReport, UserRoles};
use crate::domain::{CTVConfig, CTVError, Message};
use crate::inputter::FilterInput;
use filter::{FilterCriteria, FilterField};
use grid::{GridClick, GridView, counter_columns};
use request::{Completion, InFlight, RequestHandle, spawn_request};
use sort::{ColumnId, SortCriteria};
use store::DataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Uninitialized,
    Initialized,
    Loaded,
}

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    FILTER,
    POPUP,
}

/// The counters table: owns the data store and the grid, talks to the
/// counters api and turns user messages into table operations.
pub struct CountersTable {
    api: Arc<dyn CountersApi>,
    roles: UserRoles,
    config: CTVConfig,
    pub status: Status,
    state: TableState,
    modus: Modus,
    filter_input: FilterInput,
    filter_field: FilterField,
    store: Option<DataStore>,
    grid: Option<GridView>,
    last_refreshed: Option<String>,
    total_label: String,
    status_message: String,
    show_help: bool,
    load: Option<InFlight>,
    resets: HashMap<String, InFlight>,
    next_generation: u64,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    shutdown: CancellationToken,
    clipboard: Option<Clipboard>,
}

impl CountersTable {
    pub fn new(api: Arc<dyn CountersApi>, roles: UserRoles, config: &CTVConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            roles,
            config: config.clone(),
            status: Status::READY,
            state: TableState::Uninitialized,
            modus: Modus::TABLE,
            filter_input: FilterInput::default(),
            filter_field: FilterField::default(),
            store: None,
            grid: None,
            last_refreshed: None,
            total_label: "0".to_string(),
            status_message: String::new(),
            show_help: false,
            load: None,
            resets: HashMap::new(),
            next_generation: 0,
            tx,
            rx,
            shutdown: CancellationToken::new(),
            clipboard: None,
        }
    }

    /// Builds the store and the grid. Calling it again does nothing.
    pub fn init(&mut self) {
        if self.state != TableState::Uninitialized {
            debug!("Counters table already initialized");
            return;
        }
        let privileged = self.roles.is_dfm();
        let sort = SortCriteria::default();
        let store = DataStore::new(self.filter_criteria(), sort);
        let mut grid = GridView::new(counter_columns(privileged), self.config.max_column_width);
        grid.set_sort_column(sort.column, sort.ascending);
        grid.set_displayed_label("0");

        self.store = Some(store);
        self.grid = Some(grid);
        self.state = TableState::Initialized;
        info!("Counters table initialized (privileged: {privileged})");
    }

    /// Fits the grid into its container. No-op before [`CountersTable::init`].
    pub fn reset_table_size(&mut self, width: usize, height: usize) {
        if let Some(grid) = self.grid.as_mut() {
            grid.resize_canvas(width, height);
        }
    }

    /// Fetches the counters report. A load still in flight is superseded.
    pub fn load_counters_table(&mut self) -> RequestHandle {
        if let Some(previous) = self.load.take() {
            trace!("Superseding load #{}", previous.generation);
            previous.token.cancel();
        }
        let generation = self.generation();
        let token = self.shutdown.child_token();
        self.load = Some(InFlight {
            generation,
            token: token.clone(),
        });
        debug!("Loading counters (#{generation})");

        let api = Arc::clone(&self.api);
        spawn_request(
            token,
            self.tx.clone(),
            async move { api.counters().await },
            move |result| Completion::CountersLoaded { generation, result },
        )
    }

    /// Asks the server to reset one counter. The row only changes once the
    /// server answers; a newer reset of the same row wins over an older one.
    pub fn reset_counter(&mut self, row: &Counter) -> RequestHandle {
        let id = row.id.clone();
        if let Some(previous) = self.resets.remove(&id) {
            trace!("Superseding reset #{} of {id}", previous.generation);
            previous.token.cancel();
        }
        let generation = self.generation();
        let token = self.shutdown.child_token();
        self.resets.insert(
            id.clone(),
            InFlight {
                generation,
                token: token.clone(),
            },
        );
        debug!("Resetting counter {id} (#{generation})");

        let api = Arc::clone(&self.api);
        let request_id = id.clone();
        spawn_request(
            token,
            self.tx.clone(),
            async move { api.reset_counter(&request_id).await },
            move |result| Completion::CounterReset {
                id,
                generation,
                result,
            },
        )
    }

    /// Cancels every request in flight.
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.load = None;
        self.resets.clear();
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Applies all queued completions. Returns how many were current, stale
    /// ones are dropped and not counted.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.apply(completion) {
                count += 1;
            }
        }
        count
    }

    /// Waits for the next completion and applies it.
    pub async fn next_completion(&mut self) -> bool {
        match self.rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Applies one completion. Returns false if a newer request or a shutdown
    /// superseded it.
    pub fn apply(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::CountersLoaded { generation, result } => {
                if self.load.as_ref().map(|l| l.generation) != Some(generation) {
                    trace!("Ignoring stale load #{generation}");
                    return false;
                }
                self.load = None;
                match result {
                    Ok(report) => self.counters_loaded(report),
                    Err(CTVError::Cancelled) => debug!("Load #{generation} cancelled"),
                    Err(e) => self.handle_request_error(&e),
                }
            }
            Completion::CounterReset {
                id,
                generation,
                result,
            } => {
                if self.resets.get(&id).map(|r| r.generation) != Some(generation) {
                    trace!("Ignoring stale reset #{generation} of {id}");
                    return false;
                }
                self.resets.remove(&id);
                match result {
                    Ok(counter) => self.counter_reset(&id, counter),
                    Err(CTVError::Cancelled) => debug!("Reset #{generation} of {id} cancelled"),
                    Err(e) => self.handle_request_error(&e),
                }
            }
        }
        true
    }

    fn counters_loaded(&mut self, report: CountersReport) {
        let Some(counters) = report.counters else {
            self.total_label = "0".to_string();
            return;
        };
        let total = counters.len();
        let Some(store) = self.store.as_mut() else {
            warn!("Counters arrived before the table was initialized");
            return;
        };
        if let Err(e) = store.set_items(counters) {
            self.handle_request_error(&e.into());
            return;
        }
        store.re_sort();
        if let Some(grid) = self.grid.as_mut() {
            grid.invalidate();
        }
        self.dispatch_store_events();

        self.last_refreshed = report.generated;
        self.total_label = total.to_string();
        self.state = TableState::Loaded;
        info!("Loaded {total} counters");
        self.set_status_message(format!("Loaded {total} counters"));
    }

    fn counter_reset(&mut self, id: &str, counter: Counter) {
        let selected = self.selected_counter().map(|c| c.id.clone());
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.update_item(id, counter) {
            Ok(()) => {
                self.dispatch_store_events();
                self.follow_selection(selected.as_deref());
                info!("Counter {id} reset");
                self.set_status_message(format!("Counter {id} reset"));
            }
            Err(e) => self.handle_request_error(&e.into()),
        }
    }

    /// Keeps the cursor on the counter it was on after rows moved.
    fn follow_selection(&mut self, id: Option<&str>) {
        let row = id.and_then(|id| self.store.as_ref()?.row_of(id));
        if let (Some(row), Some(grid)) = (row, self.grid.as_mut()) {
            grid.select_row(row);
        }
    }

    /// Shared failure path of all requests: log and tell the user. The
    /// displayed data stays as it was.
    fn handle_request_error(&mut self, e: &CTVError) {
        error!("Request failed: {e}");
        self.set_status_message(format!("Error: {e}"));
    }

    fn dispatch_store_events(&mut self) {
        if let (Some(store), Some(grid)) = (self.store.as_mut(), self.grid.as_mut()) {
            for event in store.take_events() {
                grid.on_store_event(&event);
            }
        }
    }

    fn filter_criteria(&self) -> FilterCriteria {
        FilterCriteria::new(self.filter_input.filter_text(), self.filter_field)
    }

    pub fn apply_filter(&mut self) {
        let criteria = self.filter_criteria();
        if let Some(store) = self.store.as_mut() {
            trace!("Applying filter {:?}", criteria);
            store.set_filter_args(criteria);
            store.refresh();
            self.dispatch_store_events();
        }
    }

    pub fn set_filter_field(&mut self, field: FilterField) {
        self.filter_field = field;
        self.apply_filter();
    }

    pub fn focus_filter(&mut self) {
        self.filter_input.focus();
        self.modus = Modus::FILTER;
    }

    pub fn filter_key(&mut self, key: KeyEvent) {
        let result = self.filter_input.read(key);
        if result.changed {
            self.apply_filter();
        }
        if result.finished {
            self.modus = Modus::TABLE;
        }
    }

    pub fn sort(&mut self, criteria: SortCriteria) {
        if let Some(grid) = self.grid.as_mut() {
            grid.set_sort_column(criteria.column, criteria.ascending);
        }
        if let Some(store) = self.store.as_mut() {
            store.sort(criteria);
            self.dispatch_store_events();
        }
    }

    pub fn activate_header(&mut self, cell: usize) {
        let criteria = self.grid.as_mut().and_then(|g| g.activate_header(cell));
        if let Some(criteria) = criteria {
            self.sort(criteria);
        }
    }

    /// Interprets a click on a grid cell. Only the actions column does something.
    pub fn click(&mut self, row: usize, cell: usize) -> Option<RequestHandle> {
        let click = self.grid.as_ref()?.click(row, cell)?;
        self.on_grid_click(click)
    }

    fn on_grid_click(&mut self, click: GridClick) -> Option<RequestHandle> {
        if click.column != ColumnId::Actions {
            return None;
        }
        let item = self.store.as_ref()?.item(click.row)?.clone();
        Some(self.reset_counter(&item))
    }

    pub fn selected_counter(&self) -> Option<&Counter> {
        let (row, _) = self.grid.as_ref()?.selected();
        self.store.as_ref()?.item(row)
    }

    pub fn selected_cell_text(&self) -> Option<String> {
        let grid = self.grid.as_ref()?;
        let counter = self.selected_counter()?;
        let column = grid.selected_column()?;
        counter.column_value(column.id).map(str::to_string)
    }

    pub fn selected_row_csv(&self) -> Option<String> {
        let counter = self.selected_counter()?;
        let content = [
            counter.id.as_str(),
            counter.context.as_deref().unwrap_or(""),
            counter.name.as_deref().unwrap_or(""),
            counter.value.as_deref().unwrap_or(""),
        ]
        .iter()
        .map(|c| Self::wrap_cell_content(c))
        .collect::<Vec<String>>();
        Some(content.join(","))
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_to_clipboard(&mut self, text: Option<String>) {
        let Some(text) = text else {
            return;
        };
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {e}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => self.set_status_message("Copied to clipboard"),
                Err(e) => {
                    warn!("Error copying to clipboard: {e}");
                    self.set_status_message("Copy failed");
                }
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    pub fn quit(&mut self) {
        self.shutdown();
        self.status = Status::QUITTING;
    }

    fn with_grid(&mut self, f: impl FnOnce(&mut GridView)) {
        if let Some(grid) = self.grid.as_mut() {
            f(grid);
        }
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), CTVError> {
        self.pump();

        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.with_grid(|g| g.move_up(1)),
                Message::MoveDown => self.with_grid(|g| g.move_down(1)),
                Message::MoveLeft => self.with_grid(|g| g.move_left()),
                Message::MoveRight => self.with_grid(|g| g.move_right()),
                Message::MovePageUp => self.with_grid(|g| g.move_up(g.page_size())),
                Message::MovePageDown => self.with_grid(|g| g.move_down(g.page_size())),
                Message::MoveBeginning => self.with_grid(|g| g.move_beginning()),
                Message::MoveEnd => self.with_grid(|g| g.move_end()),
                Message::Sort => {
                    if let Some((_, cell)) = self.grid.as_ref().map(|g| g.selected()) {
                        self.activate_header(cell);
                    }
                }
                Message::Enter => {
                    if let Some((row, cell)) = self.grid.as_ref().map(|g| g.selected()) {
                        self.click(row, cell);
                    }
                }
                Message::Reset => {
                    let target = self.grid.as_ref().and_then(|g| {
                        let cell = g.column_index(ColumnId::Actions)?;
                        Some((g.selected().0, cell))
                    });
                    if let Some((row, cell)) = target {
                        self.click(row, cell);
                    }
                }
                Message::Reload => {
                    self.load_counters_table();
                }
                Message::FocusFilter => self.focus_filter(),
                Message::ToggleFilterField => self.set_filter_field(self.filter_field.toggle()),
                Message::CopyCell => {
                    let text = self.selected_cell_text();
                    self.copy_to_clipboard(text);
                }
                Message::CopyRow => {
                    let text = self.selected_row_csv();
                    self.copy_to_clipboard(text);
                }
                Message::Help => {
                    self.show_help = true;
                    self.modus = Modus::POPUP;
                }
                Message::Resize(width, height) => self.reset_table_size(width, height),
                _ => (),
            },
            Modus::FILTER => match msg {
                Message::RawKey(key) => self.filter_key(key),
                Message::Resize(width, height) => self.reset_table_size(width, height),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help | Message::Enter => {
                    self.show_help = false;
                    self.modus = Modus::TABLE;
                }
                Message::Resize(width, height) => self.reset_table_size(width, height),
                _ => (),
            },
        }
        Ok(())
    }

    /// Whether key events should go to the filter field unmapped.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FILTER
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn store(&self) -> Option<&DataStore> {
        self.store.as_ref()
    }

    pub fn grid(&self) -> Option<&GridView> {
        self.grid.as_ref()
    }

    pub fn filter_input(&self) -> &FilterInput {
        &self.filter_input
    }

    pub fn filter_field(&self) -> FilterField {
        self.filter_field
    }

    pub fn total_label(&self) -> &str {
        &self.total_label
    }

    pub fn displayed_label(&self) -> &str {
        self.grid.as_ref().map(|g| g.displayed_label()).unwrap_or("0")
    }

    pub fn last_refreshed(&self) -> Option<&str> {
        self.last_refreshed.as_deref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    pub fn pending_resets(&self) -> usize {
        self.resets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeApi {
        report: Mutex<Option<CountersReport>>,
        fail_load: bool,
        reset_values: HashMap<String, String>,
        reset_delays: HashMap<String, Duration>,
        reset_calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn with_counters(counters: Vec<Counter>) -> Self {
            Self {
                report: Mutex::new(Some(CountersReport {
                    generated: Some("12:00:00 UTC".into()),
                    counters: Some(counters),
                })),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CountersApi for FakeApi {
        async fn counters(&self) -> Result<CountersReport, CTVError> {
            if self.fail_load {
                return Err(CTVError::Http {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(self.report.lock().unwrap().clone().unwrap_or_default())
        }

        async fn reset_counter(&self, id: &str) -> Result<Counter, CTVError> {
            self.reset_calls.lock().unwrap().push(id.to_string());
            if let Some(delay) = self.reset_delays.get(id) {
                tokio::time::sleep(*delay).await;
            }
            let report = self.report.lock().unwrap().clone().unwrap_or_default();
            let current = report
                .counters
                .unwrap_or_default()
                .into_iter()
                .find(|c| c.id == id)
                .ok_or(CTVError::Http {
                    status: 404,
                    message: format!("no counter {id}"),
                })?;
            Ok(Counter {
                value: Some(self.reset_values.get(id).cloned().unwrap_or("0".into())),
                ..current
            })
        }

        async fn authorities(&self) -> Result<UserRoles, CTVError> {
            Ok(UserRoles::privileged())
        }
    }

    fn sample() -> Vec<Counter> {
        vec![
            Counter::new("c1", "Processor", "FilesIn", "3"),
            Counter::new("c2", "Group", "Queued", "1,024"),
            Counter::new("c3", "Processor", "FilesOut", "512"),
        ]
    }

    fn table(api: FakeApi, roles: UserRoles) -> (CountersTable, Arc<FakeApi>) {
        let api = Arc::new(api);
        let mut table = CountersTable::new(api.clone(), roles, &CTVConfig::default());
        table.init();
        table.reset_table_size(80, 20);
        (table, api)
    }

    async fn load(table: &mut CountersTable) {
        table.load_counters_table().join().await;
        table.pump();
    }

    fn value_of(table: &CountersTable, id: &str) -> Option<String> {
        table.store()?.item_by_id(id)?.value.clone()
    }

    #[tokio::test]
    async fn load_fills_store_and_labels() {
        let (mut table, _) = table(FakeApi::with_counters(sample()), UserRoles::default());
        assert_eq!(table.state(), TableState::Initialized);
        load(&mut table).await;

        assert_eq!(table.state(), TableState::Loaded);
        assert_eq!(table.total_label(), "3");
        assert_eq!(table.displayed_label(), "3");
        assert_eq!(table.last_refreshed(), Some("12:00:00 UTC"));
        let order: Vec<&str> = table
            .store()
            .unwrap()
            .visible()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(order, vec!["c2", "c1", "c3"]);
    }

    #[tokio::test]
    async fn report_without_counters_zeroes_total() {
        let api = FakeApi {
            report: Mutex::new(Some(CountersReport {
                generated: Some("now".into()),
                counters: None,
            })),
            ..Default::default()
        };
        let (mut table, _) = table(api, UserRoles::default());
        load(&mut table).await;
        assert_eq!(table.total_label(), "0");
        assert_eq!(table.state(), TableState::Initialized);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_rows() {
        let (mut table, _) = table(FakeApi::with_counters(sample()), UserRoles::default());
        load(&mut table).await;

        let failing: Arc<dyn CountersApi> = Arc::new(FakeApi {
            fail_load: true,
            ..Default::default()
        });
        table.api = failing;
        load(&mut table).await;

        assert_eq!(table.store().unwrap().total(), 3);
        assert_eq!(table.total_label(), "3");
        assert!(table.status_message().contains("503"));
    }

    #[tokio::test]
    async fn reset_updates_only_that_row() {
        let api = FakeApi::with_counters(vec![Counter::new("c1", "Processor", "FilesIn", "3")]);
        let (mut table, _) = table(api, UserRoles::privileged());
        load(&mut table).await;

        let row = table.store().unwrap().item_by_id("c1").unwrap().clone();
        table.reset_counter(&Counter::with_id(row.id)).join().await;
        // nothing changes before the completion is applied
        assert_eq!(value_of(&table, "c1").as_deref(), Some("3"));
        table.pump();

        let counter = table.store().unwrap().item_by_id("c1").unwrap();
        assert_eq!(counter.value.as_deref(), Some("0"));
        assert_eq!(counter.context.as_deref(), Some("Processor"));
        assert_eq!(counter.name.as_deref(), Some("FilesIn"));
        assert_eq!(table.pending_resets(), 0);
    }

    #[tokio::test]
    async fn out_of_order_resets_touch_their_own_rows() {
        let mut api = FakeApi::with_counters(sample());
        api.reset_values.insert("c1".into(), "10".into());
        api.reset_values.insert("c3".into(), "30".into());
        api.reset_delays.insert("c1".into(), Duration::from_millis(50));
        let (mut table, _) = table(api, UserRoles::privileged());
        load(&mut table).await;

        let c1 = table.store().unwrap().item_by_id("c1").unwrap().clone();
        let c3 = table.store().unwrap().item_by_id("c3").unwrap().clone();
        let slow = table.reset_counter(&c1);
        let fast = table.reset_counter(&c3);

        assert!(table.next_completion().await);
        assert_eq!(value_of(&table, "c3").as_deref(), Some("30"));
        assert_eq!(value_of(&table, "c1").as_deref(), Some("3"));

        assert!(table.next_completion().await);
        assert_eq!(value_of(&table, "c1").as_deref(), Some("10"));
        assert_eq!(value_of(&table, "c3").as_deref(), Some("30"));
        assert_eq!(value_of(&table, "c2").as_deref(), Some("1,024"));
        slow.join().await;
        fast.join().await;
    }

    #[tokio::test]
    async fn newer_reset_of_same_row_wins() {
        let mut api = FakeApi::with_counters(sample());
        api.reset_delays.insert("c1".into(), Duration::from_millis(20));
        let (mut table, _) = table(api, UserRoles::privileged());
        load(&mut table).await;

        let c1 = table.store().unwrap().item_by_id("c1").unwrap().clone();
        let first = table.reset_counter(&c1);
        let second = table.reset_counter(&c1);
        first.join().await;
        second.join().await;
        assert_eq!(table.pump(), 1);
        assert_eq!(value_of(&table, "c1").as_deref(), Some("0"));
        assert_eq!(table.pending_resets(), 0);
    }

    #[tokio::test]
    async fn failed_reset_keeps_value() {
        let (mut table, api) = table(FakeApi::with_counters(sample()), UserRoles::privileged());
        load(&mut table).await;

        table.reset_counter(&Counter::with_id("gone")).join().await;
        table.pump();
        assert_eq!(api.reset_calls.lock().unwrap().as_slice(), ["gone"]);
        assert!(table.status_message().contains("404"));
        assert_eq!(value_of(&table, "c1").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn actions_click_resets_for_privileged_user() {
        let (mut table, api) = table(FakeApi::with_counters(sample()), UserRoles::privileged());
        load(&mut table).await;

        assert!(table.click(0, 0).is_none());
        let handle = table.click(0, 3).expect("reset issued");
        handle.join().await;
        table.pump();
        assert_eq!(api.reset_calls.lock().unwrap().as_slice(), ["c2"]);
        assert_eq!(value_of(&table, "c2").as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn non_privileged_user_never_resets() {
        let (mut table, api) = table(FakeApi::with_counters(sample()), UserRoles::default());
        load(&mut table).await;

        assert!(!table.grid().unwrap().has_column(ColumnId::Actions));
        for cell in 0..5 {
            assert!(table.click(0, cell).is_none());
        }
        table.update(Some(Message::Reset)).unwrap();
        table.update(Some(Message::Enter)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(api.reset_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_keystrokes_narrow_rows() {
        let (mut table, _) = table(FakeApi::with_counters(sample()), UserRoles::default());
        load(&mut table).await;

        table.update(Some(Message::FocusFilter)).unwrap();
        assert!(table.raw_keyevents());
        for c in "file".chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            table.update(Some(Message::RawKey(key))).unwrap();
        }
        assert_eq!(table.displayed_label(), "2");
        assert_eq!(table.total_label(), "3");

        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        table.update(Some(Message::RawKey(key))).unwrap();
        assert!(!table.raw_keyevents());

        table.update(Some(Message::ToggleFilterField)).unwrap();
        assert_eq!(table.filter_field(), FilterField::Context);
        assert_eq!(table.displayed_label(), "0");
    }

    #[tokio::test]
    async fn sort_key_activates_current_header() {
        let (mut table, _) = table(FakeApi::with_counters(sample()), UserRoles::default());
        load(&mut table).await;

        table.update(Some(Message::MoveRight)).unwrap();
        table.update(Some(Message::MoveRight)).unwrap();
        table.update(Some(Message::Sort)).unwrap();
        let store = table.store().unwrap();
        assert_eq!(store.sort_criteria(), SortCriteria::new(ColumnId::Value, false));
        let order: Vec<&str> = store.visible().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["c2", "c3", "c1"]);

        // a reload keeps the chosen order
        load(&mut table).await;
        let order: Vec<&str> = table
            .store()
            .unwrap()
            .visible()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(order, vec!["c2", "c3", "c1"]);
    }

    #[tokio::test]
    async fn init_is_idempotent_and_resize_is_safe_before_it() {
        let api: Arc<dyn CountersApi> = Arc::new(FakeApi::with_counters(sample()));
        let mut table = CountersTable::new(api, UserRoles::default(), &CTVConfig::default());
        table.reset_table_size(10, 10);
        assert!(table.grid().is_none());

        table.init();
        table.update(Some(Message::MoveRight)).unwrap();
        table.init();
        assert_eq!(table.grid().unwrap().selected(), (0, 1));
        assert_eq!(table.state(), TableState::Initialized);
    }

    #[tokio::test]
    async fn superseded_load_is_ignored() {
        let (mut table, _) = table(FakeApi::with_counters(sample()), UserRoles::default());
        let first = table.load_counters_table();
        let second = table.load_counters_table();
        first.join().await;
        second.join().await;
        assert_eq!(table.pump(), 1);
        assert_eq!(table.total_label(), "3");
        assert!(!table.is_loading());
    }

    #[tokio::test]
    async fn reset_keeps_cursor_on_its_counter() {
        let (mut table, api) = table(FakeApi::with_counters(sample()), UserRoles::privileged());
        load(&mut table).await;

        table.update(Some(Message::MoveRight)).unwrap();
        table.update(Some(Message::MoveRight)).unwrap();
        table.update(Some(Message::Sort)).unwrap();
        assert_eq!(table.selected_counter().unwrap().id, "c2");

        table.update(Some(Message::Reset)).unwrap();
        assert!(table.next_completion().await);
        let order: Vec<&str> = table
            .store()
            .unwrap()
            .visible()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(order, vec!["c3", "c1", "c2"]);
        assert_eq!(table.selected_counter().unwrap().id, "c2");

        table.update(Some(Message::Reset)).unwrap();
        assert!(table.next_completion().await);
        assert_eq!(api.reset_calls.lock().unwrap().as_slice(), ["c2", "c2"]);
    }

    #[tokio::test]
    async fn shutdown_drops_requests_in_flight() {
        let mut api = FakeApi::with_counters(sample());
        api.reset_delays.insert("c1".into(), Duration::from_millis(20));
        let (mut table, _) = table(api, UserRoles::privileged());
        load(&mut table).await;

        let c1 = table.store().unwrap().item_by_id("c1").unwrap().clone();
        let reset = table.reset_counter(&c1);
        let reload = table.load_counters_table();
        assert_eq!(table.pending_resets(), 1);
        assert!(table.is_loading());

        table.shutdown();
        assert_eq!(table.pending_resets(), 0);
        assert!(!table.is_loading());

        reset.join().await;
        reload.join().await;
        assert_eq!(table.pump(), 0);
        assert_eq!(value_of(&table, "c1").as_deref(), Some("3"));
        assert!(!table.status_message().starts_with("Error"));
    }

    #[tokio::test]
    async fn cancelled_requests_leave_no_state() {
        let mut api = FakeApi::with_counters(sample());
        api.reset_delays.insert("c1".into(), Duration::from_millis(20));
        let (mut table, _) = table(api, UserRoles::privileged());
        load(&mut table).await;

        let c1 = table.store().unwrap().item_by_id("c1").unwrap().clone();
        let reset = table.reset_counter(&c1);
        reset.cancel();
        reset.join().await;
        let reload = table.load_counters_table();
        reload.cancel();
        reload.join().await;

        assert_eq!(table.pump(), 2);
        assert_eq!(table.pending_resets(), 0);
        assert!(!table.is_loading());
        assert_eq!(value_of(&table, "c1").as_deref(), Some("3"));
        assert_eq!(table.total_label(), "3");
        assert!(!table.status_message().starts_with("Error"));

        // the table still works afterwards
        table.reset_counter(&c1).join().await;
        table.pump();
        assert_eq!(value_of(&table, "c1").as_deref(), Some("0"));
    }

    #[test]
    fn csv_cells_are_quoted() {
        assert_eq!(CountersTable::wrap_cell_content("FilesIn"), "FilesIn");
        assert_eq!(CountersTable::wrap_cell_content("1,024"), "\"1,024\"");
        assert_eq!(CountersTable::wrap_cell_content("a\"b"), "\"a\"\"b\"");
    }
}
