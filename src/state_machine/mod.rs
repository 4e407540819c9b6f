pub mod error;
pub mod lifecycle;
pub mod trip;

/// The [`StateMachine`] trait provides calling semantics for the pure, deterministic cores of the
/// booking system: the booking lifecycle and the trip simulator.
///
/// # Functionality
/// A state machine consumes [`Input`](StateMachine::Input) and is polled for
/// [`Output`](StateMachine::Output). Both are usually enums grouping the variants a machine
/// understands, with the trait impl mapping each variant onto an inherent method. Keeping the
/// dispatch in the trait lets the inherent impl stay focused on the transition logic.
///
/// Processing input never returns output directly. Output is queued and drained by the caller with
/// [`poll_output`](StateMachine::poll_output) until it returns `None`, which lets one input fan out
/// into several outputs (a final position update followed by an arrival, say).
///
/// # Invariants
/// Implementors must be pure so that two runs fed the same input sequence produce the same output
/// sequence. This is what allows the trip simulator to be tested tick by tick without a runtime.
///
/// ## No Interior Mutability
/// State is mutated only through `&mut self`. No [`std::cell`] containers, no
/// [`std::sync`] locks, and no reference-counted shared state.
///
/// ## No IO
/// No [`std::io`], [`std::net`], and in particular no reads of the booking store. Persisting the
/// outcome of a transition is the job of whoever drives the machine.
///
/// ### No System Time
/// Reading [`std::time::Instant::now`] or wall-clock time from inside a machine is forbidden.
/// Time arrives as input: the trip simulator advances only when it is handed a tick, and pricing
/// takes the wall-clock time as a parameter.
///
/// ### No System RNG
/// Randomness must be seeded through input if it is needed at all.
///
/// ## No Concurrency or Async
/// Machines never spawn tasks or threads and contain no `async` code. The tokio task that owns a
/// trip simulator is the runner, not the machine.
///
/// # Side Effects
/// Logging through `tracing` is allowed, provided the machine logic never depends on it.
///
/// # Example
/// ```ignore
/// let mut machine = TripMachine::new(start, destination, eta_min, TripSettings::default());
///
/// machine.process_input(TripInput::Tick);
/// while let Some(output) = machine.poll_output() {
///     match output {
///         TripOutput::Moved(progress) => render(progress),
///         TripOutput::Arrived(progress) => finish(progress),
///     }
/// }
/// ```
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) from the state machine.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the oldest pending output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
