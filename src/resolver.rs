use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::debounce::Debouncer;
use crate::errors::AppResult;
use crate::fallback::FallbackSource;
use crate::geolocation::GeolocationResolver;
use crate::location::{ResolvedDestination, Suggestion, SuggestionSource};
use crate::places::PrimarySource;
use crate::telemetry::TelemetryClient;
use crate::validation::resolve_destination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub min_query_chars: usize,
    pub debounce: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            min_query_chars: 2,
            debounce: Duration::from_millis(300),
        }
    }
}

impl ResolverOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_query_chars: config.min_query_chars,
            debounce: config.debounce_window(),
        }
    }
}

/// What the destination field currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSnapshot {
    pub text: String,
    pub precise: bool,
    pub suggestions: Vec<Suggestion>,
    pub open: bool,
}

/// A suggestion lookup issued for one debounced query. Only the most recently
/// issued ticket may change the visible list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub query: String,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct FieldState {
    text: String,
    precise: bool,
    suggestions: Vec<Suggestion>,
    open: bool,
    generation: u64,
}

pub struct DestinationResolver {
    primary: PrimarySource,
    fallback: FallbackSource,
    geolocation: Arc<GeolocationResolver>,
    options: ResolverOptions,
    telemetry: Option<TelemetryClient>,
    state: Mutex<FieldState>,
}

impl DestinationResolver {
    pub fn new(
        primary: PrimarySource,
        fallback: FallbackSource,
        geolocation: Arc<GeolocationResolver>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            primary,
            fallback,
            geolocation,
            options,
            telemetry: None,
            state: Mutex::new(FieldState::default()),
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryClient) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    pub fn geolocation(&self) -> &Arc<GeolocationResolver> {
        &self.geolocation
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        let state = self.state.lock();
        FieldSnapshot {
            text: state.text.clone(),
            precise: state.precise,
            suggestions: state.suggestions.clone(),
            open: state.open,
        }
    }

    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    /// Records a keystroke. Editing always clears `precise`, and input that is
    /// too short to query drops whatever list was showing.
    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        let mut state = self.state.lock();
        if self.is_short(&text) {
            state.generation += 1;
            state.suggestions.clear();
            state.open = false;
        }
        state.text = text;
        state.precise = false;
    }

    /// Claims the next generation for `query`, superseding every earlier ticket.
    pub fn issue(&self, query: impl Into<String>) -> QueryTicket {
        let mut state = self.state.lock();
        state.generation += 1;
        QueryTicket {
            query: query.into(),
            generation: state.generation,
        }
    }

    /// Looks up suggestions for `ticket` and shows them, unless a newer ticket
    /// was issued in the meantime. Returns whether the list was applied.
    pub async fn complete(&self, ticket: QueryTicket) -> bool {
        if self.is_short(&ticket.query) {
            return self.apply(&ticket, Vec::new());
        }
        let suggestions = self.lookup(&ticket.query).await;
        self.apply(&ticket, suggestions)
    }

    pub async fn handle_debounced(&self, query: impl Into<String>) -> bool {
        let ticket = self.issue(query);
        self.complete(ticket).await
    }

    /// Primary results win outright; the fallback is only asked when the
    /// primary source is unavailable or came back empty.
    pub async fn lookup(&self, query: &str) -> Vec<Suggestion> {
        if self.primary.is_ready() {
            let primary = self.primary.predict(query).await;
            if !primary.is_empty() {
                return primary;
            }
        } else {
            self.primary.warm_up();
        }
        self.fallback.search(query).await
    }

    fn apply(&self, ticket: &QueryTicket, suggestions: Vec<Suggestion>) -> bool {
        let count = suggestions.len();
        let source = suggestions.first().map(|s| s.source);
        let latest = {
            let mut state = self.state.lock();
            if ticket.generation == state.generation {
                state.open = !suggestions.is_empty();
                state.suggestions = suggestions;
                None
            } else {
                Some(state.generation)
            }
        };

        match latest {
            Some(latest) => {
                trace!(
                    generation = ticket.generation,
                    latest,
                    "discarding stale suggestions"
                );
                if let Some(telemetry) = &self.telemetry {
                    telemetry.suggestions_discarded(&ticket.query, ticket.generation, latest);
                }
                false
            }
            None => {
                if let Some(telemetry) = &self.telemetry {
                    if !self.is_short(&ticket.query) {
                        telemetry.suggestions_resolved(&ticket.query, source, count);
                    }
                }
                true
            }
        }
    }

    /// Puts the picked suggestion into the field and closes the dropdown.
    pub fn select(&self, suggestion: &Suggestion) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.text = suggestion.value.clone();
        state.precise = suggestion.source == SuggestionSource::Geolocation;
        state.open = false;
    }

    /// Selects the suggestion at `index` in the visible list.
    pub fn select_index(&self, index: usize) -> Option<Suggestion> {
        let suggestion = self.state.lock().suggestions.get(index).cloned()?;
        self.select(&suggestion);
        Some(suggestion)
    }

    /// Pointer interaction outside the field: closes without editing.
    pub fn dismiss(&self) {
        self.state.lock().open = false;
    }

    pub fn focus(&self) {
        let mut state = self.state.lock();
        if !state.suggestions.is_empty() {
            state.open = true;
        }
    }

    /// Runs the device lookup and, when it yields a position, fills the field
    /// with the precise coordinate string.
    pub async fn use_current_location(&self) -> Option<Suggestion> {
        self.geolocation.locate().await;
        let located = self.geolocation.state();
        if let Some(reason) = located.error.as_deref() {
            if let Some(telemetry) = &self.telemetry {
                telemetry.geolocation_failed(reason);
            }
            return None;
        }
        let suggestion = located.suggestion()?;
        self.select(&suggestion);
        Some(suggestion)
    }

    /// Validates the field for a plan request.
    pub fn submit(&self) -> AppResult<ResolvedDestination> {
        let (text, precise) = {
            let state = self.state.lock();
            (state.text.trim().to_string(), state.precise)
        };
        resolve_destination(&text, precise).inspect_err(|_| {
            debug!(precise, "rejecting destination that was not picked from suggestions");
            if let Some(telemetry) = &self.telemetry {
                telemetry.destination_rejected(&text);
            }
        })
    }

    fn is_short(&self, text: &str) -> bool {
        text.chars().count() < self.options.min_query_chars
    }
}

/// Connects typing to the resolver through a debouncer. Each debounced value
/// is resolved on its own task, so slow lookups never hold up newer ones.
pub struct ResolverSession {
    resolver: Arc<DestinationResolver>,
    input: Debouncer<String>,
    pump: JoinHandle<()>,
}

impl ResolverSession {
    pub fn start(resolver: Arc<DestinationResolver>) -> Self {
        let (input, mut debounced) = Debouncer::spawn(resolver.options().debounce);
        let pump = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                while let Some(query) = debounced.recv().await {
                    if query != resolver.text() {
                        trace!("skipping debounced value that no longer matches the field");
                        continue;
                    }
                    let ticket = resolver.issue(query);
                    let resolver = Arc::clone(&resolver);
                    tokio::spawn(async move {
                        resolver.complete(ticket).await;
                    });
                }
            }
        });
        Self {
            resolver,
            input,
            pump,
        }
    }

    pub fn resolver(&self) -> &Arc<DestinationResolver> {
        &self.resolver
    }

    pub fn type_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.resolver.set_text(text.clone());
        self.input.push(text);
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        self.resolver.snapshot()
    }
}

impl Drop for ResolverSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
