#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    EditingProfile,
    EditingRequest,
    ShowingResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    Start,
    GoToContent,
    ProfileSaved,
    CancelProfile,
    EditProfile,
    Generated,
    Back,
}

/// Next screen for `event`. Pairs that make no sense on the current screen keep it.
pub fn transition(screen: Screen, event: WizardEvent, has_saved_profile: bool) -> Screen {
    use Screen::*;
    use WizardEvent::*;

    match (screen, event) {
        (Welcome, Start) => EditingProfile,
        (Welcome, GoToContent) if has_saved_profile => EditingRequest,
        (EditingProfile, ProfileSaved) => EditingRequest,
        (EditingProfile, CancelProfile) => Welcome,
        (EditingRequest, EditProfile) => EditingProfile,
        (EditingRequest, Generated) => ShowingResult,
        (ShowingResult, Back) => EditingRequest,
        (current, _) => current,
    }
}

#[derive(Debug, Clone)]
pub struct Wizard {
    screen: Screen,
    has_saved_profile: bool,
}

impl Wizard {
    /// A usable stored profile skips the welcome screen.
    pub fn new(has_saved_profile: bool) -> Self {
        let screen = if has_saved_profile {
            Screen::EditingRequest
        } else {
            Screen::Welcome
        };
        Self {
            screen,
            has_saved_profile,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn has_saved_profile(&self) -> bool {
        self.has_saved_profile
    }

    pub fn apply(&mut self, event: WizardEvent) -> Screen {
        if event == WizardEvent::ProfileSaved && self.screen == Screen::EditingProfile {
            self.has_saved_profile = true;
        }
        let next = transition(self.screen, event, self.has_saved_profile);
        if next != self.screen {
            log::debug!("wizard: {:?} --{:?}--> {:?}", self.screen, event, next);
        }
        self.screen = next;
        next
    }
}
