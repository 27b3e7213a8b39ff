//! Tick-driven text animations.
//!
//! Every animation is a pure function of the global tick counter, so any two
//! viewers looking at the same line on the same tick see the same frame.

use holograms_io::ViewerId;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationKind {
    #[default]
    Ascend,
    /// Plays forward then backward; the step count is doubled up front.
    AscendDescend,
}

/// Maps a tick to a step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationStepper {
    kind: AnimationKind,
    total_steps: i64,
    speed: i64,
    pause: i64,
}

impl AnimationStepper {
    /// `speed` is ticks per step, `pause` is ticks held on the last step.
    pub fn new(kind: AnimationKind, total_steps: i64, speed: i64, pause: i64) -> Self {
        let total_steps = match kind {
            AnimationKind::Ascend => total_steps,
            AnimationKind::AscendDescend => total_steps.saturating_mul(2),
        };
        Self {
            kind,
            total_steps,
            speed: speed.max(1),
            pause,
        }
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    pub fn total_steps(&self) -> i64 {
        self.total_steps
    }

    pub fn step(&self, tick: u64) -> usize {
        if self.total_steps <= 0 {
            return 0;
        }
        let raw = tick as i64 / self.speed;
        let pause = if self.pause > 0 {
            self.pause / self.speed
        } else {
            0
        };
        let cycle = raw % (self.total_steps + pause);
        cycle.min(self.total_steps - 1) as usize
    }

    /// The step folded back onto the original range for `AscendDescend`.
    pub fn frame(&self, tick: u64) -> usize {
        let step = self.step(tick);
        match self.kind {
            AnimationKind::Ascend => step,
            AnimationKind::AscendDescend => {
                let half = (self.total_steps / 2).max(1) as usize;
                if step < half {
                    step
                } else {
                    (self.total_steps as usize).saturating_sub(1 + step)
                }
            }
        }
    }
}

pub trait Animation: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn animate(&self, tick: u64, text: &str) -> String;
}

/// Reveals the text one character per step.
#[derive(Debug, Clone)]
pub struct TypewriterAnimation {
    name: String,
    kind: AnimationKind,
    speed: i64,
    pause: i64,
}

impl TypewriterAnimation {
    pub fn new(name: impl Into<String>, kind: AnimationKind, speed: i64, pause: i64) -> Self {
        Self {
            name: name.into(),
            kind,
            speed,
            pause,
        }
    }
}

impl Animation for TypewriterAnimation {
    fn name(&self) -> &str {
        &self.name
    }

    fn animate(&self, tick: u64, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        let stepper = AnimationStepper::new(self.kind, chars.len() as i64, self.speed, self.pause);
        let shown = stepper.frame(tick) + 1;
        chars[..shown.min(chars.len())].iter().collect()
    }
}

/// Cycles through fixed frames; `{text}` in a frame is replaced by the wrapped text.
#[derive(Debug, Clone)]
pub struct FramesAnimation {
    name: String,
    frames: Vec<String>,
    stepper: AnimationStepper,
}

impl FramesAnimation {
    pub fn new(name: impl Into<String>, frames: Vec<String>, speed: i64, pause: i64) -> Self {
        let stepper =
            AnimationStepper::new(AnimationKind::Ascend, frames.len() as i64, speed, pause);
        Self {
            name: name.into(),
            frames,
            stepper,
        }
    }
}

impl Animation for FramesAnimation {
    fn name(&self) -> &str {
        &self.name
    }

    fn animate(&self, tick: u64, text: &str) -> String {
        match self.frames.get(self.stepper.frame(tick)) {
            Some(frame) => frame.replace("{text}", text),
            None => text.to_string(),
        }
    }
}

#[derive(Default)]
pub struct AnimationRegistry {
    animations: RwLock<HashMap<String, Arc<dyn Animation>>>,
}

impl fmt::Debug for AnimationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.animations.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("AnimationRegistry")
            .field("animations", &names)
            .finish()
    }
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `typewriter` and `blink`.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(TypewriterAnimation::new(
            "typewriter",
            AnimationKind::Ascend,
            2,
            20,
        )));
        registry.register(Arc::new(FramesAnimation::new(
            "blink",
            vec!["{text}".to_string(), String::new()],
            10,
            0,
        )));
        registry
    }

    /// Replaces any animation of the same name.
    pub fn register(&self, animation: Arc<dyn Animation>) {
        let name = animation.name().to_ascii_lowercase();
        tracing::debug!(%name, "animation registered");
        self.animations.write().insert(name, animation);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Animation>> {
        self.animations
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.animations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.read().is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════
// Text formatting
// ════════════════════════════════════════════════════════════════════

/// Turns raw text-line content into what a given viewer sees on a given tick.
pub trait TextFormatter: Send + Sync {
    fn format(&self, viewer: ViewerId, text: &str, tick: u64) -> String;
}

/// Identity formatter.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainText;

impl TextFormatter for PlainText {
    fn format(&self, _viewer: ViewerId, text: &str, _tick: u64) -> String {
        text.to_string()
    }
}

static ANIMATION_SPAN: OnceLock<Regex> = OnceLock::new();

fn animation_span() -> &'static Regex {
    ANIMATION_SPAN.get_or_init(|| {
        Regex::new(r"<#ANIM:([A-Za-z0-9_-]+)>(.*?)</#ANIM>").expect("Invalid animation span Regex")
    })
}

/// Expands `<#ANIM:name>text</#ANIM>` spans. Unknown names leave the inner text as is.
#[derive(Debug, Clone)]
pub struct AnimationFormatter {
    animations: Arc<AnimationRegistry>,
}

impl AnimationFormatter {
    pub fn new(animations: Arc<AnimationRegistry>) -> Self {
        Self { animations }
    }

    pub fn animations(&self) -> &Arc<AnimationRegistry> {
        &self.animations
    }
}

impl TextFormatter for AnimationFormatter {
    fn format(&self, _viewer: ViewerId, text: &str, tick: u64) -> String {
        if !text.contains("<#ANIM:") {
            return text.to_string();
        }
        animation_span()
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let inner = &caps[2];
                match self.animations.get(&caps[1]) {
                    Some(animation) => animation.animate(tick, inner),
                    None => inner.to_string(),
                }
            })
            .into_owned()
    }
}
