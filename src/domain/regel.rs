use std::fmt;

/// A membership rule: its enum-style name and the paragraph it implements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegelId {
    name: String,
    identifikator: String,
}

impl RegelId {
    pub fn new(name: impl Into<String>, identifikator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifikator: identifikator.into(),
        }
    }

    /// E.g. `REGEL_1_4`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// E.g. `1.4`
    pub fn identifikator(&self) -> &str {
        &self.identifikator
    }
}

impl fmt::Display for RegelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Answer a rule evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Svar {
    Ja,
    Nei,
    Uavklart,
}

impl Svar {
    pub fn name(&self) -> &'static str {
        match self {
            Svar::Ja => "JA",
            Svar::Nei => "NEI",
            Svar::Uavklart => "UAVKLART",
        }
    }
}

impl fmt::Display for Svar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a rule ended where it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arsak {
    pub regel_id: RegelId,
    pub avklaring: String,
}

impl Arsak {
    pub fn new(regel_id: RegelId, avklaring: impl Into<String>) -> Self {
        Self {
            regel_id,
            avklaring: avklaring.into(),
        }
    }
}

impl fmt::Display for Arsak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.regel_id, self.avklaring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arsak_label() {
        let arsak = Arsak::new(
            RegelId::new("REGEL_3", "3"),
            "Har bruker hatt et sammenhengende arbeidsforhold?",
        );
        assert_eq!(
            arsak.to_string(),
            "REGEL_3 - Har bruker hatt et sammenhengende arbeidsforhold?"
        );
    }

    #[test]
    fn test_regel_id_display_uses_name() {
        let regel = RegelId::new("REGEL_1_4", "1.4");
        assert_eq!(regel.to_string(), "REGEL_1_4");
        assert_eq!(regel.identifikator(), "1.4");
    }
}
