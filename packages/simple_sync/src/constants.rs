// A poisoned lock means a worker or receiver panicked while holding round state. The round can
// no longer complete correctly, so we refuse to continue.
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - round state may be \
    inconsistent because a party panicked while holding it";
