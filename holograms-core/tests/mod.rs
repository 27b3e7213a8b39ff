use holograms_core::animation::{
    AnimationFormatter, AnimationKind, AnimationRegistry, AnimationStepper, TextFormatter,
};
use holograms_core::condition::Predicate;
use holograms_core::hologram::ViewerAnchor;
use holograms_core::store::{HologramDefinition, HologramStore, JsonFileStore, MemoryStore, StoreError};
use holograms_core::{
    Action, ActionExecutor, ActionList, Condition, ConditionHolder, Delivery, EngineConfig,
    Hologram, HologramEngine, HologramError, HologramRegistry, HologramSettings, Lifecycle, Line, LineType,
    Services, TickContext, Ticked, Ticker, ViewerContext,
};
use holograms_io::{EntityKind, Location, RecordingTransport, Viewer, ViewerId, ViewerRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// Harness
// ============================================================================

#[derive(Default)]
struct RecordingActions {
    runs: Mutex<Vec<(ViewerId, Vec<String>)>>,
}

impl RecordingActions {
    fn runs(&self) -> Vec<(ViewerId, Vec<String>)> {
        self.runs.lock().clone()
    }
}

impl ActionExecutor for RecordingActions {
    fn execute(&self, viewer: ViewerId, actions: &ActionList) {
        self.runs
            .lock()
            .push((viewer, actions.iter().map(|a| a.to_string()).collect()));
    }
}

struct Harness {
    viewers: Arc<ViewerRegistry>,
    transport: Arc<RecordingTransport>,
    actions: Arc<RecordingActions>,
    services: Arc<Services>,
}

fn harness() -> Harness {
    let viewers = Arc::new(ViewerRegistry::new());
    let transport = Arc::new(RecordingTransport::new());
    let actions = Arc::new(RecordingActions::default());
    let services = Arc::new(Services::new(
        EngineConfig::default(),
        transport.clone(),
        viewers.clone(),
        actions.clone(),
    ));
    Harness {
        viewers,
        transport,
        actions,
        services,
    }
}

fn origin() -> Location {
    Location::new("world", 0.0, 64.0, 0.0)
}

fn hologram(h: &Harness, lines: &[&str]) -> Arc<Hologram> {
    let holo = Hologram::new("test", h.services.clone(), origin(), HologramSettings::default());
    let page = holo.page(0).unwrap();
    for line in lines {
        page.add_line(*line).unwrap();
    }
    holo
}

fn near(h: &Harness, name: &str) -> ViewerId {
    h.viewers.connect(Viewer::new(name, origin().offset(1.0, 0.0, 0.0)))
}

fn at(tick: u64, now: Instant) -> TickContext {
    TickContext { tick, now }
}

#[derive(Debug)]
struct CountingPredicate {
    answer: bool,
    calls: AtomicUsize,
}

impl CountingPredicate {
    fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Predicate for CountingPredicate {
    fn test(&self, _ctx: &ViewerContext<'_>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

// ============================================================================
// Animation Stepper Tests
// ============================================================================

#[test]
fn test_stepper_is_deterministic() {
    let stepper = AnimationStepper::new(AnimationKind::Ascend, 5, 2, 4);
    for tick in 0..500 {
        assert_eq!(stepper.step(tick), stepper.step(tick));
    }
}

#[test]
fn test_stepper_holds_last_step_through_pause() {
    // T=5, S=2, P=4: cycle of 5 + 2 steps.
    let stepper = AnimationStepper::new(AnimationKind::Ascend, 5, 2, 4);
    assert_eq!(stepper.step(0), 0);
    assert_eq!(stepper.step(9), 4);
    assert_eq!(stepper.step(10), 4);
    assert_eq!(stepper.step(12), 4);
    assert_eq!(stepper.step(14), 0);
}

#[test]
fn test_stepper_degenerate_total_is_zero() {
    for total in [0, -1, -40] {
        let stepper = AnimationStepper::new(AnimationKind::Ascend, total, 3, 10);
        for tick in [0, 1, 17, 1_000_000] {
            assert_eq!(stepper.step(tick), 0);
        }
    }
    let stepper = AnimationStepper::new(AnimationKind::AscendDescend, 0, 1, 0);
    assert_eq!(stepper.step(99), 0);
}

#[test]
fn test_stepper_ascend_descend_doubles_total() {
    let stepper = AnimationStepper::new(AnimationKind::AscendDescend, 4, 1, 0);
    assert_eq!(stepper.total_steps(), 8);
    assert_eq!(stepper.step(7), 7);
    assert_eq!(stepper.step(8), 0);
}

#[test]
fn test_stepper_zero_speed_is_clamped() {
    let stepper = AnimationStepper::new(AnimationKind::Ascend, 3, 0, 0);
    assert_eq!(stepper.step(2), 2);
}

#[test]
fn test_animation_formatter_expands_spans() {
    let formatter = AnimationFormatter::new(Arc::new(AnimationRegistry::with_defaults()));
    let viewer = ViewerId::random();
    assert_eq!(
        formatter.format(viewer, "<#ANIM:typewriter>abc</#ANIM>!", 0),
        "a!"
    );
    assert_eq!(
        formatter.format(viewer, "x<#ANIM:nope>abc</#ANIM>", 0),
        "xabc"
    );
    assert_eq!(formatter.format(viewer, "plain", 7), "plain");
}

// ============================================================================
// Content Parser Chain Tests
// ============================================================================

#[test]
fn test_parser_small_head_geometry() {
    let h = harness();
    let line = Line::new(h.services.clone(), "#SMALLHEAD:PLAYER_HEAD (Notch)", origin()).unwrap();
    assert_eq!(line.line_type(), Some(LineType::SmallHead));
    assert_eq!(line.height(), 0.6);
    assert_eq!(line.offsets().y, -1.1875);
}

#[test]
fn test_parser_fallback_is_text() {
    let h = harness();
    let line = Line::new(h.services.clone(), "just words #ICON: later", origin()).unwrap();
    assert_eq!(line.line_type(), Some(LineType::Text));
    assert_eq!(line.height(), 0.3);
    assert_eq!(line.offsets().y, -0.5);
}

#[test]
fn test_parser_markers_select_variants() {
    let h = harness();
    let cases = [
        ("#ICON:DIAMOND", LineType::Icon),
        ("#HEAD:PLAYER_HEAD", LineType::Head),
        ("#ENTITY:ZOMBIE", LineType::Entity),
        ("", LineType::Text),
    ];
    for (content, expected) in cases {
        let line = Line::new(h.services.clone(), content, origin()).unwrap();
        assert_eq!(line.line_type(), Some(expected), "{content}");
    }
}

#[test]
fn test_parser_same_variant_updates_in_place() {
    let h = harness();
    let viewer = ViewerId::random();
    let line = Line::new(h.services.clone(), "Hello", origin()).unwrap();
    line.display(viewer);
    let entities = line.entities();

    line.set_content("World").unwrap();

    assert_eq!(line.entities(), entities);
    assert_eq!(h.transport.despawn_count(viewer), 0);
    assert_eq!(h.transport.metadata_count(viewer), 1);
    assert_eq!(h.transport.last_name(viewer, entities[0]).as_deref(), Some("World"));
}

#[test]
fn test_parser_variant_swap_respawns_for_same_viewers() {
    let h = harness();
    let viewer = ViewerId::random();
    let line = Line::new(h.services.clone(), "Hello", origin()).unwrap();
    line.display(viewer);

    let line_type = line.set_content("#ICON:DIAMOND").unwrap();

    assert_eq!(line_type, LineType::Icon);
    assert_eq!(h.transport.despawn_count(viewer), 1);
    // One stand for the text, then a stand and an item for the icon.
    assert_eq!(h.transport.spawn_count(viewer), 3);
    assert!(line.is_shown_to(viewer));
    assert_eq!(line.height(), 0.55);
}

#[test]
fn test_parser_entity_type_change_respawns() {
    let h = harness();
    let viewer = ViewerId::random();
    let line = Line::new(h.services.clone(), "#ENTITY:ZOMBIE", origin()).unwrap();
    line.display(viewer);
    h.transport.clear();

    line.set_content("#ENTITY:COW").unwrap();

    assert_eq!(h.transport.despawn_count(viewer), 1);
    let kinds: Vec<EntityKind> = h.transport.spawns().into_iter().map(|(_, s)| s.kind).collect();
    assert_eq!(kinds, vec![EntityKind::Living("COW".to_string())]);
    assert!(line.is_shown_to(viewer));
    assert_eq!(line.height(), 1.3);

    // Same type in another spelling keeps the spawned entity.
    h.transport.clear();
    line.set_content("#ENTITY:cow").unwrap();
    assert_eq!(h.transport.spawn_count(viewer), 0);
    assert_eq!(h.transport.despawn_count(viewer), 0);
    assert_eq!(h.transport.metadata_count(viewer), 1);
}

#[test]
fn test_text_line_reports_no_width() {
    let h = harness();
    let line = Line::new(h.services.clone(), "A fairly long line of text", origin()).unwrap();
    assert_eq!(line.width(), 0.0);
    let icon = Line::new(h.services.clone(), "#ICON:DIAMOND", origin()).unwrap();
    assert_eq!(icon.width(), 0.5);
}

#[test]
fn test_parser_empty_chain_reports_no_match() {
    let chain = holograms_core::content::ContentParserChain::new();
    let err = chain.classify("anything").unwrap_err();
    assert!(matches!(err, HologramError::NoParserMatched(_)));
}

// ============================================================================
// Condition Holder Tests
// ============================================================================

#[test]
fn test_condition_required_failure_short_circuits() {
    let h = harness();
    let first = CountingPredicate::new(false);
    let second = CountingPredicate::new(true);
    let holder = ConditionHolder::new()
        .with(Condition::custom(first.clone()))
        .with(Condition::custom(second.clone()));

    let viewer = near(&h, "a");
    let ctx = ViewerContext::new(viewer, h.viewers.as_ref());

    assert!(!holder.check(&ctx, h.actions.as_ref()));
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
}

#[test]
fn test_condition_optional_failure_continues() {
    let h = harness();
    let first = CountingPredicate::new(false);
    let second = CountingPredicate::new(true);
    let not_met = ActionList::new().with(Action::new("MESSAGE", "nope"));
    let holder = ConditionHolder::new()
        .with(Condition::custom(first.clone()).optional().on_not_met(not_met))
        .with(Condition::custom(second.clone()));

    let viewer = near(&h, "a");
    let ctx = ViewerContext::new(viewer, h.viewers.as_ref());

    assert!(holder.check(&ctx, h.actions.as_ref()));
    assert_eq!(second.calls(), 1);
    assert_eq!(h.actions.runs(), vec![(viewer, vec!["MESSAGE:nope".to_string()])]);
}

#[test]
fn test_condition_met_actions_not_run_by_holder() {
    let h = harness();
    let met = ActionList::new().with(Action::new("MESSAGE", "welcome"));
    let holder = ConditionHolder::new().with(Condition::custom(CountingPredicate::new(true)).on_met(met));

    let viewer = near(&h, "a");
    let ctx = ViewerContext::new(viewer, h.viewers.as_ref());

    let evaluation = holder.evaluate(&ctx, h.actions.as_ref());
    assert!(evaluation.passed);
    assert_eq!(evaluation.fulfilled, vec![0]);
    assert!(h.actions.runs().is_empty());
}

#[test]
fn test_condition_permission_and_inversion() {
    let h = harness();
    let viewer = h
        .viewers
        .connect(Viewer::new("a", origin()).with_permission("vip"));
    let ctx = ViewerContext::new(viewer, h.viewers.as_ref());

    assert!(Condition::permission("vip").is_fulfilled(&ctx));
    assert!(!Condition::permission("vip").inverted().is_fulfilled(&ctx));
    assert!(!Condition::permission("admin").is_fulfilled(&ctx));
}

#[test]
fn test_condition_distance_missing_data_is_not_met() {
    let h = harness();
    let viewer = h.viewers.connect(Viewer::new("a", Location::new("nether", 0.0, 64.0, 0.0)));
    let ctx = ViewerContext::new(viewer, h.viewers.as_ref());
    assert!(!Condition::distance(origin(), 1000.0).is_fulfilled(&ctx));

    let gone = ViewerContext::new(ViewerId::random(), h.viewers.as_ref());
    assert!(!Condition::distance(origin(), 1000.0).is_fulfilled(&gone));
}

#[test]
fn test_condition_custom_not_persisted() {
    let holder = ConditionHolder::new()
        .with(Condition::permission("vip"))
        .with(Condition::custom(CountingPredicate::new(true)));
    let json = serde_json::to_string(&holder.persistable()).unwrap();
    let back: ConditionHolder = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), 1);
    assert!(back.conditions()[0].required);
}

// ============================================================================
// Scheduler Tests
// ============================================================================

struct Failing;

impl Ticked for Failing {
    fn label(&self) -> String {
        "failing".into()
    }

    fn tick(&self, _ctx: &TickContext) -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }
}

struct Panicking;

impl Ticked for Panicking {
    fn label(&self) -> String {
        "panicking".into()
    }

    fn tick(&self, _ctx: &TickContext) -> anyhow::Result<()> {
        panic!("unit panicked")
    }
}

#[derive(Default)]
struct Counter(AtomicUsize);

impl Ticked for Counter {
    fn label(&self) -> String {
        "counter".into()
    }

    fn tick(&self, _ctx: &TickContext) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_ticker_isolates_failing_units() {
    let ticker = Ticker::new(Duration::from_millis(50));
    let failing: Arc<dyn Ticked> = Arc::new(Failing);
    let panicking: Arc<dyn Ticked> = Arc::new(Panicking);
    let counter = Arc::new(Counter::default());
    let counter_unit: Arc<dyn Ticked> = counter.clone();

    ticker.start(Arc::downgrade(&failing));
    ticker.start(Arc::downgrade(&panicking));
    ticker.start(Arc::downgrade(&counter_unit));

    let now = Instant::now();
    ticker.pulse(now);
    ticker.pulse(now);

    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    assert_eq!(ticker.len(), 3);
}

#[test]
fn test_ticker_stop_prevents_further_ticks() {
    let ticker = Ticker::new(Duration::from_millis(50));
    let counter = Arc::new(Counter::default());
    let unit: Arc<dyn Ticked> = counter.clone();
    let handle = ticker.start(Arc::downgrade(&unit));

    ticker.pulse(Instant::now());
    assert!(ticker.stop(handle));
    ticker.pulse(Instant::now());

    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    assert!(!ticker.stop(handle));
}

#[tokio::test]
async fn test_ticker_loop_pulses_until_shutdown() {
    let ticker = Arc::new(Ticker::new(Duration::from_millis(5)));
    let counter = Arc::new(Counter::default());
    let unit: Arc<dyn Ticked> = counter.clone();
    ticker.start(Arc::downgrade(&unit));

    let task = ticker.spawn();
    tokio::time::sleep(Duration::from_millis(60)).await;
    ticker.shutdown();
    task.await.unwrap();

    let ticks = counter.0.load(Ordering::SeqCst);
    assert!(ticks > 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counter.0.load(Ordering::SeqCst), ticks);
}

// ============================================================================
// Hologram Tick & Visibility Tests
// ============================================================================

#[test]
fn test_content_pass_throttle_nineteen_then_twentieth() {
    let h = harness();
    let holo = hologram(&h, &["Hi"]);
    let viewer = near(&h, "a");

    // First tick runs both passes.
    let t0 = Instant::now();
    holo.tick(&at(0, t0)).unwrap();
    assert!(holo.visibility().is_visible(viewer));
    let baseline = h.transport.metadata_count(viewer);
    assert_eq!(baseline, 1);

    for k in 1..=19u64 {
        holo.tick(&at(k, t0 + Duration::from_millis(50 * k))).unwrap();
    }
    assert_eq!(h.transport.metadata_count(viewer), baseline);

    holo.tick(&at(20, t0 + Duration::from_millis(1000))).unwrap();
    assert_eq!(h.transport.metadata_count(viewer), baseline + 1);
}

#[test]
fn test_visibility_follows_distance() {
    let h = harness();
    let holo = hologram(&h, &["Hi"]);
    let viewer = near(&h, "a");
    let t0 = Instant::now();

    holo.update_visibility(t0);
    assert_eq!(h.transport.spawn_count(viewer), 1);

    h.viewers.move_to(viewer, origin().offset(100.0, 0.0, 0.0));
    holo.update_visibility(t0 + Duration::from_millis(500));
    assert!(!holo.visibility().is_visible(viewer));
    assert_eq!(h.transport.despawn_count(viewer), 1);

    h.viewers.move_to(viewer, origin());
    holo.update_visibility(t0 + Duration::from_millis(1000));
    assert!(holo.visibility().is_visible(viewer));
    assert_eq!(h.transport.spawn_count(viewer), 2);
}

#[test]
fn test_hidden_viewer_gets_no_content_updates() {
    let h = harness();
    let holo = hologram(&h, &["Hi", "There"]);
    let close = near(&h, "close");
    let far = h
        .viewers
        .connect(Viewer::new("far", origin().offset(300.0, 0.0, 0.0)));

    let t0 = Instant::now();
    holo.update_visibility(t0);
    holo.update_contents(t0);
    holo.update_contents(t0 + Duration::from_secs(2));

    assert!(h.transport.ops_for(far).is_empty());
    assert_eq!(h.transport.metadata_count(close), 4);
}

#[test]
fn test_met_actions_run_on_becoming_visible() {
    let h = harness();
    let holo = hologram(&h, &["VIP lounge"]);
    holo.set_view_conditions(
        ConditionHolder::new().with(
            Condition::permission("vip")
                .on_met(ActionList::new().with(Action::new("MESSAGE", "welcome")))
                .on_not_met(ActionList::new().with(Action::new("MESSAGE", "members only"))),
        ),
    );
    let viewer = near(&h, "a");
    let t0 = Instant::now();

    holo.update_visibility(t0);
    assert!(!holo.visibility().is_visible(viewer));

    h.viewers.grant(viewer, "vip");
    holo.update_visibility(t0 + Duration::from_millis(500));
    assert!(holo.visibility().is_visible(viewer));

    let runs: Vec<Vec<String>> = h.actions.runs().into_iter().map(|(_, a)| a).collect();
    assert_eq!(
        runs,
        vec![
            vec!["MESSAGE:members only".to_string()],
            vec!["MESSAGE:welcome".to_string()],
        ]
    );
}

#[test]
fn test_line_view_conditions_gate_single_lines() {
    let h = harness();
    let holo = hologram(&h, &["Everyone", "Staff only"]);
    let page = holo.page(0).unwrap();
    let staff_line = page.line(1).unwrap();
    staff_line.set_view_conditions(ConditionHolder::new().with(Condition::permission("staff")));

    let viewer = near(&h, "a");
    let t0 = Instant::now();
    holo.update_visibility(t0);
    assert_eq!(h.transport.spawn_count(viewer), 1);
    assert!(!staff_line.is_shown_to(viewer));

    h.viewers.grant(viewer, "staff");
    holo.update_contents(t0);
    assert!(staff_line.is_shown_to(viewer));
    assert_eq!(h.transport.spawn_count(viewer), 2);
}

#[test]
fn test_disabled_hologram_hides_everyone() {
    let h = harness();
    let holo = hologram(&h, &["Hi"]);
    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());

    holo.set_enabled(false);

    assert!(!holo.visibility().is_visible(viewer));
    assert_eq!(h.transport.despawn_count(viewer), 1);
    h.transport.clear();
    holo.tick(&at(1, Instant::now())).unwrap();
    assert!(h.transport.ops().is_empty());
}

#[test]
fn test_pending_hologram_does_not_tick() {
    let h = harness();
    let holo = Hologram::pending("later", h.services.clone(), origin(), HologramSettings::default());
    holo.add_page().add_line("Hi").unwrap();
    let viewer = near(&h, "a");

    holo.tick(&at(0, Instant::now())).unwrap();
    assert!(h.transport.ops_for(viewer).is_empty());

    holo.mark_ready();
    holo.tick(&at(1, Instant::now())).unwrap();
    assert_eq!(h.transport.spawn_count(viewer), 1);
}

#[test]
fn test_gone_viewer_is_swallowed_and_released() {
    let h = harness();
    let holo = hologram(&h, &["Hi"]);
    let line = holo.page(0).unwrap().line(0).unwrap();
    let viewer = near(&h, "a");
    let t0 = Instant::now();
    holo.update_visibility(t0);

    h.transport.mark_gone(viewer);
    holo.update_contents(t0);
    assert!(!line.is_shown_to(viewer));
    assert!(!holo.page(0).unwrap().is_viewing(viewer));
    assert!(holo.visibility().state(viewer).is_none());

    h.viewers.disconnect(viewer);
    holo.update_visibility(t0 + Duration::from_millis(500));
    assert!(holo.visibility().state(viewer).is_none());
}

#[test]
fn test_refused_spawn_is_retried_by_content_pass() {
    let h = harness();
    let holo = hologram(&h, &["Hi"]);
    let line = holo.page(0).unwrap().line(0).unwrap();
    let viewer = near(&h, "a");
    let t0 = Instant::now();

    h.transport.reject_spawn(0);
    holo.update_visibility(t0);
    assert!(holo.visibility().is_visible(viewer));
    assert!(!line.is_shown_to(viewer));
    assert_eq!(h.transport.spawn_count(viewer), 0);

    holo.update_contents(t0 + Duration::from_millis(50));
    assert!(line.is_shown_to(viewer));
    assert_eq!(h.transport.spawn_count(viewer), 1);
    assert_eq!(h.transport.metadata_count(viewer), 0);
}

#[test]
fn test_refused_spawn_rolls_back_partial_line() {
    let h = harness();
    let viewer = ViewerId::random();
    let line = Line::new(h.services.clone(), "#ICON:DIAMOND", origin()).unwrap();

    // The stand goes out, the item riding it is refused.
    h.transport.reject_spawn(1);
    assert_eq!(line.display(viewer), Delivery::Failed);
    assert!(!line.is_shown_to(viewer));
    assert_eq!(h.transport.spawn_count(viewer), 1);
    assert_eq!(h.transport.despawn_count(viewer), 1);

    assert_eq!(line.display(viewer), Delivery::Sent);
    assert!(line.is_shown_to(viewer));
    assert_eq!(h.transport.spawn_count(viewer), 3);
}

// ============================================================================
// Page Structure & Navigation Tests
// ============================================================================

fn paged(h: &Harness) -> Arc<Hologram> {
    let holo = hologram(h, &["page 0"]);
    holo.add_page().add_line("page 1").unwrap();
    holo.add_page().add_line("page 2").unwrap();
    holo
}

fn first_entity(holo: &Hologram, page: usize) -> holograms_io::EntityId {
    holo.page(page).unwrap().line(0).unwrap().entities()[0]
}

#[test]
fn test_set_page_swaps_atomically() {
    let h = harness();
    let holo = paged(&h);
    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());

    holo.set_page(viewer, 1).unwrap();

    assert_eq!(holo.page_of(viewer), 1);
    assert_eq!(h.transport.despawn_count(viewer), 1);
    assert!(!holo.page(0).unwrap().is_viewing(viewer));
    assert!(holo.page(1).unwrap().is_viewing(viewer));
    let entity = first_entity(&holo, 1);
    assert_eq!(h.transport.last_name(viewer, entity).as_deref(), Some("page 1"));
}

#[test]
fn test_set_page_out_of_range() {
    let h = harness();
    let holo = paged(&h);
    let err = holo.set_page(ViewerId::random(), 3).unwrap_err();
    assert!(matches!(err, HologramError::PageOutOfRange { index: 3, len: 3 }));
}

#[test]
fn test_next_and_previous_page_wrap() {
    let h = harness();
    let holo = paged(&h);
    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());

    assert_eq!(holo.previous_page(viewer).unwrap(), 2);
    assert_eq!(holo.next_page(viewer).unwrap(), 0);
    assert_eq!(holo.next_page(viewer).unwrap(), 1);
    assert!(holo.page(1).unwrap().is_viewing(viewer));
}

#[test]
fn test_insert_page_shifts_indices_at_or_after() {
    let h = harness();
    let holo = paged(&h);
    let on_one = near(&h, "one");
    let on_zero = near(&h, "zero");
    holo.update_visibility(Instant::now());
    holo.set_page(on_one, 1).unwrap();
    let shown = holo.page(1).unwrap();
    h.transport.clear();

    holo.insert_page(1).unwrap();

    assert_eq!(holo.page_of(on_one), 2);
    assert_eq!(holo.page_of(on_zero), 0);
    // Index 2 is now the page the viewer was already on.
    assert!(Arc::ptr_eq(&holo.page(2).unwrap(), &shown));
    assert!(shown.is_viewing(on_one));
    assert!(h.transport.ops().is_empty());
}

#[test]
fn test_remove_page_re_resolves_shown_content() {
    let h = harness();
    let holo = paged(&h);
    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());
    holo.set_page(viewer, 1).unwrap();
    let removed = holo.page(1).unwrap();
    h.transport.clear();

    holo.remove_page(1).unwrap();

    assert_eq!(holo.page_of(viewer), 0);
    assert!(!removed.is_viewing(viewer));
    assert!(holo.page(0).unwrap().is_viewing(viewer));
    assert_eq!(h.transport.despawn_count(viewer), 1);
    assert_eq!(h.transport.spawn_count(viewer), 1);
}

#[test]
fn test_clear_pages_resets_indices() {
    let h = harness();
    let holo = paged(&h);
    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());
    holo.set_page(viewer, 2).unwrap();

    holo.clear_pages();

    assert_eq!(holo.page_count(), 0);
    assert_eq!(holo.page_of(viewer), 0);
    assert_eq!(h.transport.despawn_count(viewer), 2);
}

#[test]
fn test_page_layout_stacks_lines_downwards() {
    let h = harness();
    let holo = hologram(&h, &["a", "#SMALLHEAD:PLAYER_HEAD", "b"]);
    let page = holo.page(0).unwrap();

    assert!((page.height() - 1.2).abs() < 1e-9);
    let ys: Vec<f64> = page.lines().iter().map(|l| l.location().y).collect();
    assert!((ys[0] - (64.0 - 0.5)).abs() < 1e-9);
    assert!((ys[1] - (64.0 - 0.3 - 1.1875)).abs() < 1e-9);
    assert!((ys[2] - (64.0 - 0.9 - 0.5)).abs() < 1e-9);
}

// ============================================================================
// Interaction & Binding Tests
// ============================================================================

#[test]
fn test_click_runs_page_then_line_actions() {
    let h = harness();
    let holo = hologram(&h, &["Click me"]);
    holo.update_settings(|s| s.interactive = true);
    let page = holo.page(0).unwrap();
    page.set_click_actions(ActionList::new().with(Action::new("SOUND", "click")));
    let line = page.line(0).unwrap();
    line.set_click_actions(ActionList::new().with(Action::new("COMMAND", "spawn")));

    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());

    assert!(holo.click(viewer, line.entities()[0]));
    let runs: Vec<Vec<String>> = h.actions.runs().into_iter().map(|(_, a)| a).collect();
    assert_eq!(
        runs,
        vec![vec!["SOUND:click".to_string()], vec!["COMMAND:spawn".to_string()]]
    );
}

#[test]
fn test_click_ignored_when_not_interactive() {
    let h = harness();
    let holo = hologram(&h, &["Click me"]);
    let line = holo.page(0).unwrap().line(0).unwrap();
    line.set_click_actions(ActionList::new().with(Action::new("COMMAND", "spawn")));
    let viewer = near(&h, "a");
    holo.update_visibility(Instant::now());

    assert!(!holo.click(viewer, line.entities()[0]));
    assert!(h.actions.runs().is_empty());
}

#[test]
fn test_viewer_anchor_places_hologram_in_front() {
    let h = harness();
    let holo = hologram(&h, &[]);
    let viewer = h.viewers.connect(Viewer::new("mover", origin()));

    holo.bind(Arc::new(ViewerAnchor::new(viewer)));

    let at = holo.location();
    assert!(at.x.abs() < 1e-9);
    assert!((at.y - 65.62).abs() < 1e-6);
    assert!((at.z - 5.0).abs() < 1e-9);

    h.viewers.set_sneaking(viewer, true);
    holo.recalculate();
    let snapped = holo.location();
    assert_eq!((snapped.x, snapped.y, snapped.z), (0.5, 65.5, 5.5));
}

#[test]
fn test_viewer_anchor_distance_is_clamped() {
    let anchor = ViewerAnchor::with_distance(ViewerId::random(), 12);
    anchor.increase_distance();
    anchor.increase_distance();
    assert_eq!(anchor.distance(), 13);

    let anchor = ViewerAnchor::with_distance(ViewerId::random(), 4);
    anchor.decrease_distance();
    anchor.decrease_distance();
    assert_eq!(anchor.distance(), 3);
}

// ============================================================================
// Destruction Tests
// ============================================================================

#[test]
fn test_destroy_hides_each_visible_viewer_once_and_stops_ticking() {
    let h = harness();
    let holo = hologram(&h, &["Goodbye"]);
    holo.start_ticking();
    let viewers: Vec<ViewerId> = (0..3).map(|i| near(&h, &format!("v{i}"))).collect();

    h.services.ticker.pulse(Instant::now());
    for v in &viewers {
        assert!(holo.visibility().is_visible(*v));
    }
    h.transport.clear();

    holo.destroy();

    for v in &viewers {
        assert_eq!(h.transport.despawn_count(*v), 1);
    }
    assert_eq!(h.transport.ops().len(), 3);
    assert_eq!(holo.lifecycle(), Lifecycle::Destroyed);
    assert!(!holo.is_ticking());

    h.transport.clear();
    h.services.ticker.pulse(Instant::now() + Duration::from_secs(5));
    assert!(h.transport.ops().is_empty());
}

#[test]
fn test_destroyed_hologram_rejects_edits() {
    let h = harness();
    let holo = paged(&h);
    holo.destroy();
    assert!(matches!(
        holo.insert_page(0),
        Err(HologramError::Destroyed(_))
    ));
}

// ============================================================================
// Store Tests
// ============================================================================

#[tokio::test]
async fn test_json_store_save_list_load_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("holograms"));
    let definition = HologramDefinition::simple("lobby", origin(), &["Welcome", "#ICON:DIAMOND"]);

    store.save(&definition).await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec!["lobby".to_string()]);

    let loaded = store.load("lobby").await.unwrap();
    assert_eq!(loaded.pages.len(), 1);
    assert_eq!(loaded.pages[0].lines[1].content, "#ICON:DIAMOND");
    assert!(loaded.saved_at.is_some());

    store.delete("lobby").await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
    assert!(matches!(store.load("lobby").await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_json_store_missing_dir_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("nope"));
    assert!(store.list().await.unwrap().is_empty());
}

#[test]
fn test_definition_round_trip_through_hologram() {
    let h = harness();
    let holo = paged(&h);
    holo.set_view_conditions(ConditionHolder::new().with(Condition::permission("vip")));

    let definition = holo.to_definition();
    let copy = Hologram::new("copy", h.services.clone(), Location::default(), HologramSettings::default());
    copy.apply_definition(&definition).unwrap();

    assert_eq!(copy.page_count(), 3);
    assert_eq!(copy.page(2).unwrap().line(0).unwrap().content(), "page 2");
    assert_eq!(copy.location(), origin());
    assert_eq!(copy.view_conditions().len(), 1);
}

#[test]
fn test_config_load_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load(dir.path().join("missing.json")).unwrap();
    assert_eq!(config.visibility_interval_ms, 500);
    assert_eq!(config.defaults.update_interval, 20);
}

#[test]
fn test_config_load_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{"tick_period_ms": 25, "defaults": {"view_distance": 16.0}}"#).unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.tick_period_ms, 25);
    assert_eq!(config.defaults.view_distance, 16.0);
    assert!(config.defaults.enabled);
}

// ============================================================================
// Registry Tests
// ============================================================================

#[tokio::test]
async fn test_registry_load_is_two_phase() {
    let h = harness();
    let store = Arc::new(MemoryStore::new());
    store.insert(HologramDefinition::simple("lobby", origin(), &["Welcome"]));
    let registry = HologramRegistry::new(h.services.clone(), store);

    let holo = registry.load("lobby").unwrap();
    assert_eq!(holo.lifecycle(), Lifecycle::Pending);
    assert!(holo.is_ticking());

    assert_eq!(holo.wait_ready().await, Lifecycle::Ready);
    assert_eq!(holo.page(0).unwrap().line(0).unwrap().content(), "Welcome");
}

#[tokio::test]
async fn test_registry_failed_load_unregisters() {
    let h = harness();
    let registry = HologramRegistry::new(h.services.clone(), Arc::new(MemoryStore::new()));

    let holo = registry.load("missing").unwrap();
    assert_eq!(holo.wait_ready().await, Lifecycle::Destroyed);
    assert!(registry.get("missing").is_none());
}

#[tokio::test]
async fn test_registry_duplicate_and_save() {
    let h = harness();
    let store = Arc::new(MemoryStore::new());
    let registry = HologramRegistry::new(h.services.clone(), store.clone());

    registry.create("a", origin()).unwrap();
    assert!(matches!(
        registry.create("a", origin()),
        Err(HologramError::DuplicateName(_))
    ));

    registry.save("a").await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec!["a".to_string()]);
    assert!(matches!(
        registry.save("b").await,
        Err(HologramError::UnknownHologram(_))
    ));
}

#[tokio::test]
async fn test_registry_disconnect_releases_viewer_everywhere() {
    let h = harness();
    let registry = HologramRegistry::new(h.services.clone(), Arc::new(MemoryStore::new()));
    let a = registry.create("a", origin()).unwrap();
    let b = registry.create("b", origin()).unwrap();
    a.page(0).unwrap().add_line("A").unwrap();
    b.page(0).unwrap().add_line("B").unwrap();
    let viewer = near(&h, "v");
    h.services.ticker.pulse(Instant::now());

    registry.on_viewer_disconnect(viewer);

    assert!(a.visibility().state(viewer).is_none());
    assert!(b.visibility().state(viewer).is_none());
    assert_eq!(h.transport.despawn_count(viewer), 2);
}

// ============================================================================
// Engine Tests
// ============================================================================

#[tokio::test]
async fn test_engine_loads_ticks_and_shuts_down() {
    let viewers = Arc::new(ViewerRegistry::new());
    let transport = Arc::new(RecordingTransport::new());
    let store = Arc::new(MemoryStore::new());
    store.insert(HologramDefinition::simple("lobby", origin(), &["Welcome"]));

    let config = EngineConfig {
        tick_period_ms: 5,
        ..EngineConfig::default()
    };
    let engine = HologramEngine::start(
        config,
        transport.clone(),
        viewers.clone(),
        Arc::new(RecordingActions::default()),
        store,
        viewers.subscribe(),
    )
    .await
    .unwrap();

    let holo = engine.registry.get("lobby").unwrap();
    assert_eq!(holo.wait_ready().await, Lifecycle::Ready);

    let viewer = viewers.connect(Viewer::new("a", origin()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.spawn_count(viewer), 1);

    viewers.disconnect(viewer);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(holo.visibility().state(viewer).is_none());

    engine.shutdown();
    assert!(engine.registry.is_empty());
    assert_eq!(holo.lifecycle(), Lifecycle::Destroyed);
}
