// Runtime entry points emitted by the loop-to-cilk rewrite. The runtime
// schedules [0, trip_count) over workers, calling body(closure, low, high)
// for each chunk.
pub const CILK_FOR_32: &str = "__cilkrts_cilk_for_32";
pub const CILK_FOR_64: &str = "__cilkrts_cilk_for_64";

// Grain size 0 lets the runtime pick its own chunking.
pub const CILK_FOR_GRAIN: i32 = 0;

// Slot width of the closure record built for an outlined loop body.
pub const CLOSURE_SLOT_SIZE: i32 = 8;
