use core::marker::PhantomData;

/// A state-machine event that carries a message of type `M`.
///
/// Sinks are configured with the event to raise when a message arrives; the
/// saga's transition table decides what the event means in each state.
pub struct DataEvent<M> {
    name: &'static str,
    _message: PhantomData<fn(&M)>,
}

impl<M> DataEvent<M> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _message: PhantomData,
        }
    }

    /// Stable event name (e.g. "order_submitted").
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// Manual impls: derives would demand `M: Clone` etc.
impl<M> Clone for DataEvent<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for DataEvent<M> {}

impl<M> PartialEq for DataEvent<M> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<M> Eq for DataEvent<M> {}

impl<M> core::fmt::Debug for DataEvent<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("DataEvent").field(&self.name).finish()
    }
}

impl<M> core::fmt::Display for DataEvent<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}
