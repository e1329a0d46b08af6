use biometrics::{Collector, Counter, Moments};

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("lingua_chat.stream.fragments");
pub(crate) static STREAM_BYTES: Counter = Counter::new("lingua_chat.stream.bytes");
pub(crate) static STREAM_NON_EXTENDING: Counter =
    Counter::new("lingua_chat.stream.non_extending_fragments");
pub(crate) static STREAM_ENCODING_FALLBACKS: Counter =
    Counter::new("lingua_chat.stream.encoding_fallbacks");
pub(crate) static STREAM_SINK_ERRORS: Counter = Counter::new("lingua_chat.stream.sink_errors");

pub(crate) static SESSION_TURNS: Counter = Counter::new("lingua_chat.session.turns");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("lingua_chat.session.turn_duration_seconds");
pub(crate) static SESSION_GENERATION_ERRORS: Counter =
    Counter::new("lingua_chat.session.generation_errors");
pub(crate) static SESSION_USAGE_ERRORS: Counter = Counter::new("lingua_chat.session.usage_errors");
pub(crate) static SESSION_LANGUAGE_SWITCHES: Counter =
    Counter::new("lingua_chat.session.language_switches");

pub(crate) static MODEL_LOADS: Counter = Counter::new("lingua_chat.model.loads");
pub(crate) static MODEL_LOAD_ERRORS: Counter = Counter::new("lingua_chat.model.load_errors");
pub(crate) static MODEL_LOAD_DURATION: Moments =
    Moments::new("lingua_chat.model.load_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_NON_EXTENDING);
    collector.register_counter(&STREAM_ENCODING_FALLBACKS);
    collector.register_counter(&STREAM_SINK_ERRORS);

    collector.register_counter(&SESSION_TURNS);
    collector.register_moments(&SESSION_TURN_DURATION);
    collector.register_counter(&SESSION_GENERATION_ERRORS);
    collector.register_counter(&SESSION_USAGE_ERRORS);
    collector.register_counter(&SESSION_LANGUAGE_SWITCHES);

    collector.register_counter(&MODEL_LOADS);
    collector.register_counter(&MODEL_LOAD_ERRORS);
    collector.register_moments(&MODEL_LOAD_DURATION);
}
