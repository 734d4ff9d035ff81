/// Source of per-execution scoped resources.
///
/// The scheduler calls [`create_scope`](ScopeFactory::create_scope) once per
/// admitted execution and hands the scope to the task callback by value. The
/// scope is released (dropped) when the callback's future completes, whatever
/// the outcome.
///
/// Any `Fn() -> S` closure is a factory:
///
/// ```rust
/// use tickwork_runtime::ScopeFactory;
///
/// let factory = || String::from("request-scoped");
/// assert_eq!(factory.create_scope(), "request-scoped");
/// ```
pub trait ScopeFactory: Send + Sync + 'static {
    type Scope: Send + 'static;

    fn create_scope(&self) -> Self::Scope;
}

impl<F, S> ScopeFactory for F
where
    F: Fn() -> S + Send + Sync + 'static,
    S: Send + 'static,
{
    type Scope = S;

    fn create_scope(&self) -> S {
        self()
    }
}

/// Factory for tasks that need no per-execution resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScope;

impl ScopeFactory for NoScope {
    type Scope = ();

    fn create_scope(&self) {}
}
