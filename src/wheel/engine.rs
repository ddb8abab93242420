use crate::category::{Category, Classifier};
use crate::config::{self, Settings};
use crate::events::{InventoryChange, TriggerEvent, WheelEvent};
use crate::handler::HandlerContext;
use crate::item::{Item, ItemId};
use crate::search::{
    CollectRequest, CollectedItemInfo, ExtraSlotsSource, InventorySearcher, ItemCollector, Scope,
    SourceRegistry,
};
use crate::sys::host::Host;
use crate::wheel::model::{CategoryWheel, DragDenied};
use crate::wheel::pending::PendingQueue;
use async_channel::{Receiver, Sender};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Whether the engine is in the middle of rearranging the collection it observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    ApplyingSwap,
}

/// Holds [`SyncState::ApplyingSwap`] for its lifetime, including during unwinding.
pub(crate) struct SwapGuard(Rc<Cell<SyncState>>);

impl SwapGuard {
    pub(crate) fn enter(state: &Rc<Cell<SyncState>>) -> Self {
        state.set(SyncState::ApplyingSwap);
        Self(state.clone())
    }
}

impl Drop for SwapGuard {
    fn drop(&mut self) {
        self.0.set(SyncState::Idle);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Resolved(usize),
    Unresolved,
}

pub(crate) fn scope_of(host: &Host) -> Scope {
    Scope {
        primary: host.primary_id(),
        secondary: host.secondary_id(),
    }
}

pub(crate) fn push_quick_slot(host: &Host, index: usize, item: Option<&Item>) {
    match host.quick_slots.try_borrow_mut() {
        Ok(mut slots) => slots.set(index, item),
        Err(_) => log::warn!("Quick slot {} is busy, selection not mirrored", index),
    }
}

fn read_quick_slot(host: &Host, index: usize) -> Option<Item> {
    host.quick_slots.try_borrow().ok()?.get(index)
}

/// Owns every category wheel and keeps them in step with the host's inventory.
///
/// Everything runs on the caller's thread: the host calls [`WheelEngine::tick`] once per frame
/// and forwards user input through the callback methods. Inventory notifications arrive on the
/// channel returned by [`WheelEngine::events`] and are applied on the next tick.
pub struct WheelEngine {
    settings: Settings,
    classifier: Classifier,
    collector: ItemCollector,
    host: Option<Host>,
    pub(crate) wheels: BTreeMap<Category, CategoryWheel>,
    pub(crate) state: Rc<Cell<SyncState>>,
    pub(crate) pending: PendingQueue,
    active: Option<Category>,
    visible: bool,
    pressed: Option<Category>,
    tx: Sender<WheelEvent>,
    rx: Receiver<WheelEvent>,
    deferred: VecDeque<WheelEvent>,
    ticks: u64,
}

impl WheelEngine {
    pub fn new(settings: Settings) -> Self {
        Self::with_registry(settings, Arc::new(SourceRegistry::default()))
    }

    /// Builds an engine searching through `registry`, which may carry host-specific sources.
    pub fn with_registry(settings: Settings, registry: Arc<SourceRegistry>) -> Self {
        if settings.deep_containers {
            registry.register(ExtraSlotsSource);
        }
        let (tx, rx) = async_channel::unbounded();
        Self {
            classifier: settings.classifier(),
            collector: ItemCollector::new(InventorySearcher::new(registry)),
            settings,
            host: None,
            wheels: BTreeMap::new(),
            state: Rc::new(Cell::new(SyncState::Idle)),
            pending: PendingQueue::default(),
            active: None,
            visible: false,
            pressed: None,
            tx,
            rx,
            deferred: VecDeque::new(),
            ticks: 0,
        }
    }

    /// Sender for host notifications, settings reloads and triggers.
    pub fn events(&self) -> Sender<WheelEvent> {
        self.tx.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sync_state(&self) -> SyncState {
        self.state.get()
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn wheel(&self, category: Category) -> Option<&CategoryWheel> {
        self.wheels.get(&category)
    }

    pub fn active(&self) -> Option<Category> {
        self.active
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn in_session(&self) -> bool {
        self.host.is_some()
    }

    pub(crate) fn host(&self) -> Option<Host> {
        self.host.clone()
    }

    pub(crate) fn quick_slot_index(&self, category: Category) -> usize {
        self.settings.quick_slot(category)
    }

    // --- session ---

    /// Binds the engine to a host, subscribing to its primary collection. Any previous session
    /// is torn down first.
    pub fn start_session(&mut self, host: Host) {
        if self.host.is_some() {
            self.end_session();
        }
        host.primary.borrow_mut().subscribe(self.tx.clone());
        log::info!("Wheel session started on collection {}", host.primary_id());
        self.host = Some(host);

        let enabled: Vec<Category> =
            Category::iter().filter(|c| self.settings.is_enabled(*c)).collect();
        for category in enabled {
            self.ensure_wheel(category);
            self.refresh(category, false, false);
        }
    }

    /// Drops every wheel and pending record and returns the guard to idle.
    pub fn end_session(&mut self) {
        if let Some(host) = self.host.take()
            && let Ok(mut primary) = host.primary.try_borrow_mut()
        {
            primary.unsubscribe();
        }
        self.wheels.clear();
        self.pending.clear();
        self.state.set(SyncState::Idle);
        self.active = None;
        self.visible = false;
        self.pressed = None;
        self.deferred.clear();
        while self.rx.try_recv().is_ok() {}
        log::info!("Wheel session ended");
    }

    pub fn ensure_wheel(&mut self, category: Category) -> &mut CategoryWheel {
        self.wheels.entry(category).or_insert_with(|| {
            log::debug!("Created {} wheel", category);
            CategoryWheel::new(category)
        })
    }

    // --- refresh ---

    fn collect(
        &self,
        host: &Host,
        category: Category,
        predicate: &dyn Fn(&Item) -> bool,
        stacking: bool,
    ) -> Vec<CollectedItemInfo> {
        self.collector.collect(&CollectRequest {
            primary: host.primary.clone(),
            secondary: host.secondary.clone(),
            equipment: Some(host.equipment.clone()),
            actor: Some(host.actor.clone()),
            category,
            predicate,
            options: self.settings.collect_options(),
            enable_stacking: stacking,
        })
    }

    /// Live check whether `item` is still anywhere this category's wheel searches.
    pub(crate) fn item_in_scope(&self, host: &Host, category: Category, item: &Item) -> bool {
        let same = |candidate: &Item| candidate.is_same(item);
        !self.collect(host, category, &same, false).is_empty()
    }

    /// Rebuilds `category`'s wheel from the host inventory. Returns `false` when the category
    /// has nothing to show.
    pub fn refresh(
        &mut self,
        category: Category,
        reset_selection: bool,
        skip_shortcut_sync: bool,
    ) -> bool {
        if self.state.get() == SyncState::ApplyingSwap {
            log::debug!("Refresh of {} skipped while a swap is applied", category);
            return true;
        }
        let Some(host) = self.host.clone() else {
            return false;
        };
        if !self.settings.is_enabled(category) {
            return false;
        }

        let classifier = self.classifier.clone();
        let matches = |item: &Item| classifier.matches(item, category);
        let infos = self.collect(&host, category, &matches, self.settings.stacks(category));
        let scope = scope_of(&host);
        let mut wheel = self
            .wheels
            .remove(&category)
            .unwrap_or_else(|| CategoryWheel::new(category));

        let found = !infos.is_empty();
        let resolution = if found {
            wheel.rebuild(infos, &scope);
            let resolution =
                self.reconcile_selection(&host, &mut wheel, reset_selection, skip_shortcut_sync);
            wheel.is_first_load = false;
            resolution
        } else {
            wheel.clear();
            if !skip_shortcut_sync && let Some(chosen) = wheel.last_selected.clone() {
                self.defer_missing(&host, category, chosen);
            }
            Resolution::Unresolved
        };

        if let Resolution::Resolved(index) = resolution
            && !skip_shortcut_sync
        {
            push_quick_slot(&host, self.quick_slot_index(category), wheel.slot(index));
        }

        log::debug!(
            "Refreshed {} wheel: {} slot(s), selection {:?}",
            category,
            wheel.filled_slot_indices().len(),
            wheel.last_confirmed
        );

        self.wheels.insert(category, wheel);
        self.push_view(category);
        found
    }

    pub fn refresh_all(&mut self, reset_selection: bool) {
        let categories: Vec<Category> = self.wheels.keys().copied().collect();
        for category in categories {
            self.refresh(category, reset_selection, false);
        }
    }

    fn reconcile_selection(
        &mut self,
        host: &Host,
        wheel: &mut CategoryWheel,
        reset_selection: bool,
        skip_shortcut_sync: bool,
    ) -> Resolution {
        let category = wheel.category;
        let ctx = HandlerContext::new(host, category, scope_of(host));

        if let Some(index) = category.handler().preferred_index(wheel, &ctx)
            && wheel.select(index)
        {
            self.pending.remove(category);
            return Resolution::Resolved(index);
        }

        if reset_selection {
            return Self::select_first(wheel);
        }

        if wheel.is_first_load
            && let Some(saved) = read_quick_slot(host, self.quick_slot_index(category))
            && let Some(index) = wheel.locate(&saved)
        {
            wheel.select(index);
            return Resolution::Resolved(index);
        }

        if let Some(index) = wheel.valid_selection() {
            return Resolution::Resolved(index);
        }

        let Some(chosen) = wheel.last_selected.clone() else {
            return if skip_shortcut_sync {
                Resolution::Unresolved
            } else {
                Self::select_first(wheel)
            };
        };

        if let Some(index) = wheel.locate(&chosen) {
            wheel.select(index);
            self.pending.remove(category);
            return Resolution::Resolved(index);
        }

        if !skip_shortcut_sync {
            self.defer_missing(host, category, chosen);
        }
        Resolution::Unresolved
    }

    fn select_first(wheel: &mut CategoryWheel) -> Resolution {
        match wheel.first_available() {
            Some(index) => {
                wheel.select(index);
                Resolution::Resolved(index)
            }
            None => {
                wheel.last_confirmed = None;
                Resolution::Unresolved
            }
        }
    }

    /// The chosen item is not on the wheel. Items still in scope are left alone; anything else
    /// gets a bounded grace period before the selection moves on.
    fn defer_missing(&mut self, host: &Host, category: Category, chosen: Item) {
        if self.item_in_scope(host, category, &chosen) {
            log::debug!("'{}' is off the wheel but still in scope", chosen.name);
            return;
        }
        let name = chosen.name.clone();
        if self.pending.enqueue(category, chosen) {
            log::debug!("'{}' vanished from the {} wheel, waiting", name, category);
        }
    }

    pub(crate) fn push_view(&self, category: Category) {
        if self.active != Some(category) {
            return;
        }
        let (Some(host), Some(wheel)) = (&self.host, self.wheels.get(&category)) else {
            return;
        };
        match host.view.try_borrow_mut() {
            Ok(mut view) => {
                view.set_slots(category, wheel.slots());
                view.set_selected_index(wheel.valid_selection());
            }
            Err(_) => log::warn!("View is busy, {} wheel not redrawn", category),
        };
    }

    // --- events ---

    /// Advances one frame: resolves pending disappearances, then applies queued events.
    pub fn tick(&mut self) {
        self.ticks += 1;
        self.advance_pending();
        self.pump_events();
    }

    pub fn pump_events(&mut self) {
        let mut events: Vec<WheelEvent> = self.deferred.drain(..).collect();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        if events.is_empty() {
            return;
        }

        let mut dirty = BTreeSet::new();
        for event in events {
            match event {
                WheelEvent::InventoryChanged(change) => {
                    dirty.extend(self.categories_for_change(change));
                }
                WheelEvent::ItemRemoved(id) => dirty.extend(self.categories_showing(id)),
                WheelEvent::Trigger(category, trigger) => self.on_trigger(category, trigger),
                WheelEvent::SettingsReload => self.reload_settings(),
            }
        }

        for category in dirty {
            self.refresh(category, false, false);
        }
    }

    /// Applies one event immediately, for hosts that notify synchronously.
    pub fn handle_event(&mut self, event: WheelEvent) {
        self.deferred.push_back(event);
        self.pump_events();
    }

    pub fn on_inventory_changed(&mut self, change: InventoryChange) {
        if self.state.get() == SyncState::ApplyingSwap {
            return;
        }
        for category in self.categories_for_change(change) {
            self.refresh(category, false, false);
        }
    }

    pub fn on_item_removed(&mut self, id: ItemId) {
        for category in self.categories_showing(id) {
            self.refresh(category, false, false);
        }
    }

    fn categories_for_change(&self, change: InventoryChange) -> BTreeSet<Category> {
        let mut categories = BTreeSet::new();
        let Some(host) = &self.host else {
            return categories;
        };
        let scope = scope_of(host);
        if change.collection != scope.primary && Some(change.collection) != scope.secondary {
            return categories;
        }

        let collection = if change.collection == scope.primary {
            Some(&host.primary)
        } else {
            host.secondary.as_ref()
        };
        if let Some(inv) = collection.and_then(|c| c.try_borrow().ok())
            && let Some(item) = inv.get_at(change.index)
        {
            let nested = inv.nested_slots(&item).unwrap_or_default();
            for candidate in std::iter::once(&item).chain(nested.iter().flatten()) {
                categories.extend(
                    Category::iter().filter(|c| self.classifier.matches(candidate, *c)),
                );
            }
        }

        for (category, wheel) in &self.wheels {
            let shown = (0..crate::wheel::SLOT_COUNT)
                .filter_map(|i| wheel.displayed(i))
                .flat_map(|info| info.all_locations())
                .any(|loc| {
                    loc.collection() == Some(change.collection) && loc.top_index == change.index
                });
            if shown {
                categories.insert(*category);
            }
        }

        categories.retain(|c| self.wheels.contains_key(c));
        categories
    }

    fn categories_showing(&self, id: ItemId) -> BTreeSet<Category> {
        self.wheels
            .iter()
            .filter(|(_, w)| {
                w.contains_item(id) || w.last_selected.as_ref().is_some_and(|s| s.id == id)
            })
            .map(|(c, _)| *c)
            .collect()
    }

    /// Drops the collection's own notifications raised while the guard is held. Anything else
    /// that arrived meanwhile is kept for the next pump.
    pub(crate) fn discard_self_changes(&mut self) {
        let Some(primary) = self.host.as_ref().map(|h| h.primary_id()) else {
            return;
        };
        let mut dropped = 0;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                WheelEvent::InventoryChanged(change) if change.collection == primary => dropped += 1,
                other => self.deferred.push_back(other),
            }
        }
        if dropped > 0 {
            log::debug!("Suppressed {} self-inflicted change notification(s)", dropped);
        }
    }

    // --- settings ---

    pub fn apply_settings(&mut self, settings: Settings) {
        if settings.deep_containers != self.settings.deep_containers {
            let registry = self.collector.searcher().registry();
            if settings.deep_containers {
                registry.register(ExtraSlotsSource);
            } else {
                registry.unregister::<ExtraSlotsSource>();
            }
        }
        self.classifier = settings.classifier();
        self.settings = settings;

        let disabled: Vec<Category> = self
            .wheels
            .keys()
            .copied()
            .filter(|c| !self.settings.is_enabled(*c))
            .collect();
        for category in disabled {
            self.wheels.remove(&category);
            self.pending.remove(category);
        }
        if self.host.is_some() {
            let enabled: Vec<Category> =
                Category::iter().filter(|c| self.settings.is_enabled(*c)).collect();
            for category in enabled {
                self.ensure_wheel(category);
            }
        }
        self.refresh_all(false);
    }

    pub fn reload_settings(&mut self) {
        match config::load_settings() {
            Ok(settings) => {
                self.apply_settings(settings);
                log::info!("Settings reloaded");
            }
            Err(e) => log::error!("Failed to reload settings: {}", e),
        }
    }

    // --- triggers and selection ---

    pub fn on_trigger(&mut self, category: Category, trigger: TriggerEvent) {
        if !self.settings.is_enabled(category) || self.host.is_none() {
            return;
        }
        match trigger {
            TriggerEvent::Pressed => {
                self.pressed = Some(category);
                self.ensure_wheel(category);
                self.refresh(category, false, false);
            }
            TriggerEvent::Held => self.show_wheel(category),
            TriggerEvent::Released => {
                let pressed = self.pressed.take();
                if self.visible && self.active == Some(category) {
                    self.hide_wheel(true);
                } else if pressed == Some(category) {
                    self.quick_use(category);
                }
            }
            TriggerEvent::Cancelled => {
                self.pressed = None;
                if self.visible && self.active == Some(category) {
                    self.hide_wheel(false);
                }
            }
            TriggerEvent::Scroll(steps) => self.scroll(category, steps),
        }
    }

    pub fn show_wheel(&mut self, category: Category) {
        let Some(host) = self.host.clone() else {
            return;
        };
        if self.visible && self.active != Some(category) {
            self.hide_wheel(false);
        }
        self.ensure_wheel(category);
        self.refresh(category, false, false);

        if let Some(wheel) = self.wheels.get_mut(&category) {
            let ctx = HandlerContext::new(&host, category, scope_of(&host));
            category.handler().on_wheel_shown(wheel, &ctx);
            wheel.hover_index = None;
        }

        self.active = Some(category);
        self.visible = true;
        self.push_view(category);
        match host.view.try_borrow_mut() {
            Ok(mut view) => view.show(category),
            Err(_) => log::warn!("View is busy, {} wheel not shown", category),
        }
    }

    /// Closes the visible wheel. With `execute`, the hovered slot (or the current selection)
    /// is confirmed and used.
    pub fn hide_wheel(&mut self, execute: bool) {
        let Some(category) = self.active.filter(|_| self.visible) else {
            return;
        };
        self.visible = false;

        let hovered = self
            .wheels
            .get_mut(&category)
            .and_then(|w| w.hover_index.take())
            .filter(|_| execute);
        if let Some(host) = &self.host {
            match host.view.try_borrow_mut() {
                Ok(mut view) => view.hide(execute),
                Err(_) => log::warn!("View is busy, {} wheel not hidden", category),
            }
        }

        if execute {
            if let Some(index) = hovered {
                self.confirm_selection(category, index);
            }
            self.execute_selection(category);
        }
        self.active = None;
    }

    pub fn cancel(&mut self) {
        self.pressed = None;
        self.hide_wheel(false);
    }

    fn quick_use(&mut self, category: Category) {
        self.refresh(category, false, false);
        self.execute_selection(category);
    }

    fn scroll(&mut self, category: Category, steps: i32) {
        self.ensure_wheel(category);
        let next = self.wheels.get(&category).and_then(|w| w.step_selection(steps));
        if let Some(index) = next {
            self.confirm_selection(category, index);
        }
    }

    /// Uses the selected item through the category's handler.
    pub fn execute_selection(&mut self, category: Category) {
        let Some(host) = self.host.clone() else {
            return;
        };
        // Host changes queued before the handler runs are not its own.
        self.pump_events();
        let Some(wheel) = self.wheels.get(&category) else {
            return;
        };
        let Some(item) = wheel.selected_item().cloned() else {
            match &wheel.last_selected {
                Some(chosen) => log::debug!(
                    "'{}' is not on the {} wheel right now, nothing used",
                    chosen.name,
                    category
                ),
                None => log::debug!("Nothing selected on the {} wheel", category),
            }
            return;
        };

        let handler = category.handler();
        let ctx = HandlerContext::new(&host, category, scope_of(&host));
        let result = {
            let _guard = handler.mutates_inventory().then(|| SwapGuard::enter(&self.state));
            handler.use_item(&item, &ctx, wheel)
        };
        if handler.mutates_inventory() {
            self.discard_self_changes();
        }

        if let Err(e) = result {
            log::warn!("Using '{}' from the {} wheel failed: {}", item.name, category, e);
        }
        self.refresh(category, false, false);
    }

    /// Makes `index` the confirmed selection and lets the category react to it.
    pub fn confirm_selection(&mut self, category: Category, index: usize) -> bool {
        let Some(host) = self.host.clone() else {
            return false;
        };
        let quick_slot = self.quick_slot_index(category);
        let Some(wheel) = self.wheels.get_mut(&category) else {
            return false;
        };
        if !wheel.select(index) {
            return false;
        }
        self.pending.remove(category);
        push_quick_slot(&host, quick_slot, wheel.slot(index));

        // Refreshing on queued host changes can move the chosen item to another slot.
        self.pump_events();
        let Some(wheel) = self.wheels.get(&category) else {
            return false;
        };
        let chosen = wheel
            .valid_selection()
            .and_then(|i| wheel.slot(i).cloned().map(|item| (i, item)));

        if let Some((index, item)) = chosen {
            let handler = category.handler();
            let ctx = HandlerContext::new(&host, category, scope_of(&host));
            let result = {
                let _guard = handler.mutates_inventory().then(|| SwapGuard::enter(&self.state));
                handler.on_item_selected(&item, index, &ctx, wheel)
            };
            if handler.mutates_inventory() {
                self.discard_self_changes();
            }
            if let Err(e) = result {
                log::warn!("Selecting '{}' on the {} wheel failed: {}", item.name, category, e);
            }
        }

        self.refresh(category, false, false);
        true
    }

    // --- presentation callbacks ---

    pub fn on_item_selected(&mut self, category: Category, index: usize) -> bool {
        self.confirm_selection(category, index)
    }

    pub fn on_selection_changed(&mut self, category: Category, index: usize) {
        if let Some(wheel) = self.wheels.get_mut(&category) {
            wheel.hover_index = wheel.is_occupied(index).then_some(index);
        }
    }

    pub fn on_shown(&mut self, category: Category) {
        log::debug!("{} wheel on screen", category);
        self.push_view(category);
    }

    pub fn on_hidden(&mut self, category: Category, index: Option<usize>) {
        if self.active == Some(category) {
            self.visible = false;
            self.active = None;
        }
        if let Some(index) = index
            && self.wheel(category).is_some_and(|w| w.valid_selection() != Some(index))
        {
            self.confirm_selection(category, index);
        }
    }

    pub fn can_drag(&self, category: Category, index: usize) -> Result<(), DragDenied> {
        let (Some(host), Some(wheel)) = (&self.host, self.wheels.get(&category)) else {
            return Err(DragDenied::Empty(index));
        };
        wheel.can_drag(index, &scope_of(host))
    }
}
