//! Per-connection session state owned by the connection task.

/// Registration progress. NICK and USER may arrive in either order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    NickSet,
    UserSet,
    /// Both received but registration is held back (CAP negotiation).
    BothSet,
    Registered,
}

impl RegistrationState {
    pub fn after_nick(self) -> Self {
        match self {
            Self::Unregistered | Self::NickSet => Self::NickSet,
            Self::UserSet | Self::BothSet => Self::BothSet,
            Self::Registered => Self::Registered,
        }
    }

    pub fn after_user(self) -> Self {
        match self {
            Self::Unregistered | Self::UserSet => Self::UserSet,
            Self::NickSet | Self::BothSet => Self::BothSet,
            Self::Registered => Self::Registered,
        }
    }

    pub fn has_nick(self) -> bool {
        matches!(self, Self::NickSet | Self::BothSet | Self::Registered)
    }

    pub fn has_user(self) -> bool {
        matches!(self, Self::UserSet | Self::BothSet | Self::Registered)
    }
}

/// Outcome of the PASS command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassState {
    #[default]
    NotSent,
    Accepted,
    Rejected,
}

/// Connection-local state. Never shared across tasks.
#[derive(Debug, Default)]
pub struct Session {
    pub state: RegistrationState,
    /// CAP LS/REQ seen before registration; cleared by CAP END.
    pub cap_negotiating: bool,
    pub pass: PassState,
    pub tls: bool,
    pub lines_in: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// A PING is outstanding.
    pub awaiting_pong: bool,
    /// Consecutive intervals without a PONG.
    pub strikes: u32,
    pub failed_oper_attempts: u32,
}

impl Session {
    pub fn new(tls: bool) -> Self {
        Self {
            tls,
            ..Self::default()
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegistrationState::Registered
    }

    /// A PONG (or any PING/PONG traffic from the client) clears strikes.
    pub fn record_pong(&mut self) {
        self.awaiting_pong = false;
        self.strikes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn either_order_reaches_both() {
        let s = RegistrationState::Unregistered.after_nick().after_user();
        assert_eq!(s, RegistrationState::BothSet);
        let s = RegistrationState::Unregistered.after_user().after_nick();
        assert_eq!(s, RegistrationState::BothSet);
        assert!(s.has_nick() && s.has_user());
    }

    #[test]
    fn repeated_nick_keeps_state() {
        let s = RegistrationState::NickSet.after_nick();
        assert_eq!(s, RegistrationState::NickSet);
        assert!(!s.has_user());
        assert_eq!(
            RegistrationState::Registered.after_user(),
            RegistrationState::Registered
        );
    }

    #[test]
    fn pong_clears_strikes() {
        let mut session = Session::new(false);
        session.awaiting_pong = true;
        session.strikes = 2;
        session.record_pong();
        assert!(!session.awaiting_pong);
        assert_eq!(session.strikes, 0);
    }
}
