//! Connection-Registry – Wer ist online, auf welcher Verbindung
//!
//! Einzige Quelle der Wahrheit fuer die Zuordnung Verbindung <-> Benutzername.
//! Zwei Indizes hinter einer gemeinsamen Sperre:
//! - `verbindung -> benutzer` (Entfernen beim Trennen)
//! - `benutzer -> verbindung` (Routing-Lookup)
//!
//! ## Invarianten
//! - Ein Benutzername zeigt auf hoechstens eine Verbindung. Eine neue
//!   Bindung verdraengt die vorherige (last writer wins), die verdraengte
//!   Verbindung bleibt registriert, aber ohne Benutzernamen.
//! - Der leere Name ist der Platzhalter frisch verbundener Clients und wird
//!   nie in den Benutzer-Index aufgenommen.
//! - Beide Indizes werden nur gemeinsam unter der Sperre veraendert, kein
//!   Aufrufer sieht einen halb aktualisierten Zustand.
//! - Die Sperre wird nie ueber einen `.await` gehalten.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use voxrelay_core::ConnectionId;

/// Prozessweite Registry, per Handle an Router und Hub weitergereicht
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    benutzer_nach_verbindung: HashMap<ConnectionId, String>,
    verbindung_nach_benutzer: HashMap<String, ConnectionId>,
}

impl RegistryInner {
    /// Bindet `benutzer` an `verbindung` und gibt eine verdraengte Verbindung zurueck
    fn binden(&mut self, verbindung: ConnectionId, benutzer: &str) -> Option<ConnectionId> {
        // Alte Bindung dieser Verbindung loesen, aber nur wenn der Index noch auf uns zeigt
        if let Some(alt) = self.benutzer_nach_verbindung.get(&verbindung) {
            if alt.as_str() != benutzer
                && self.verbindung_nach_benutzer.get(alt) == Some(&verbindung)
            {
                self.verbindung_nach_benutzer.remove(alt);
            }
        }

        self.benutzer_nach_verbindung
            .insert(verbindung, benutzer.to_string());

        if benutzer.is_empty() {
            return None;
        }

        let verdraengt = self
            .verbindung_nach_benutzer
            .insert(benutzer.to_string(), verbindung)
            .filter(|alt| *alt != verbindung);

        if let Some(alt) = verdraengt {
            if let Some(name) = self.benutzer_nach_verbindung.get_mut(&alt) {
                name.clear();
            }
        }
        verdraengt
    }
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry (einmal pro Prozess)
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung mit Benutzernamen (leer = noch unbekannt)
    ///
    /// Idempotent bezueglich der Verbindungs-ID.
    pub fn speichern(&self, verbindung: ConnectionId, benutzer: &str) {
        let verdraengt = self.inner.lock().binden(verbindung, benutzer);
        tracing::debug!(verbindung = %verbindung, benutzer = %benutzer, "Verbindung registriert");
        if let Some(alt) = verdraengt {
            tracing::debug!(benutzer = %benutzer, alt = %alt, "Fruehere Verbindung verdraengt");
        }
    }

    /// Upsert per Verbindungs-ID, ueberschreibt den Benutzernamen
    ///
    /// Gibt die Verbindung zurueck, die bisher fuer diesen Benutzer galt,
    /// falls es eine andere war.
    pub fn aktualisieren(&self, verbindung: ConnectionId, benutzer: &str) -> Option<ConnectionId> {
        let verdraengt = self.inner.lock().binden(verbindung, benutzer);
        tracing::trace!(verbindung = %verbindung, benutzer = %benutzer, "Zuordnung aktualisiert");
        verdraengt
    }

    /// Entfernt eine Verbindung
    ///
    /// Unbekannte Verbindungen sind kein Fehler. Gibt den zuletzt gebundenen
    /// Namen zurueck (leer wenn nie gesetzt).
    pub fn entfernen(&self, verbindung: &ConnectionId) -> Option<String> {
        let mut inner = self.inner.lock();
        let benutzer = inner.benutzer_nach_verbindung.remove(verbindung)?;
        if !benutzer.is_empty() && inner.verbindung_nach_benutzer.get(&benutzer) == Some(verbindung)
        {
            inner.verbindung_nach_benutzer.remove(&benutzer);
        }
        Some(benutzer)
    }

    /// Aktuelle Verbindung eines Benutzers
    ///
    /// `None` ist ein normales Ergebnis (nie verbunden oder getrennt).
    pub fn verbindung_suchen(&self, benutzer: &str) -> Option<ConnectionId> {
        if benutzer.is_empty() {
            return None;
        }
        self.inner.lock().verbindung_nach_benutzer.get(benutzer).copied()
    }

    /// Benutzername einer Verbindung (leer wenn noch nicht gesetzt)
    pub fn benutzer_von(&self, verbindung: &ConnectionId) -> Option<String> {
        self.inner
            .lock()
            .benutzer_nach_verbindung
            .get(verbindung)
            .cloned()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, verbindung: &ConnectionId) -> bool {
        self.inner
            .lock()
            .benutzer_nach_verbindung
            .contains_key(verbindung)
    }

    /// Anzahl registrierter Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.lock().benutzer_nach_verbindung.len()
    }

    /// Anzahl Benutzer mit aktueller Verbindung
    pub fn benutzer_anzahl(&self) -> usize {
        self.inner.lock().verbindung_nach_benutzer.len()
    }

    #[cfg(test)]
    fn indizes_konsistent(&self) -> bool {
        let inner = self.inner.lock();
        inner
            .verbindung_nach_benutzer
            .iter()
            .all(|(name, id)| inner.benutzer_nach_verbindung.get(id) == Some(name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neue_verbindung_ohne_namen() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();

        registry.speichern(c1, "");
        assert!(registry.ist_registriert(&c1));
        assert_eq!(registry.benutzer_von(&c1).as_deref(), Some(""));
        assert_eq!(registry.verbindung_suchen(""), None);
        assert_eq!(registry.benutzer_anzahl(), 0);
    }

    #[test]
    fn erste_nachricht_bindet_namen() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();

        registry.speichern(c1, "");
        assert_eq!(registry.aktualisieren(c1, "alice"), None);
        assert_eq!(registry.verbindung_suchen("alice"), Some(c1));
        assert_eq!(registry.benutzer_von(&c1).as_deref(), Some("alice"));
    }

    #[test]
    fn neue_verbindung_verdraengt_alte() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        registry.speichern(c1, "");
        registry.speichern(c2, "");
        registry.aktualisieren(c1, "alice");

        assert_eq!(registry.aktualisieren(c2, "alice"), Some(c1));
        assert_eq!(registry.verbindung_suchen("alice"), Some(c2));
        // c1 bleibt online, aber ohne Namen
        assert!(registry.ist_registriert(&c1));
        assert_eq!(registry.benutzer_von(&c1).as_deref(), Some(""));
        assert!(registry.indizes_konsistent());
    }

    #[test]
    fn trennen_der_verdraengten_verbindung_behaelt_neue_zuordnung() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        registry.aktualisieren(c1, "alice");
        registry.aktualisieren(c2, "alice");
        registry.entfernen(&c1);

        assert_eq!(registry.verbindung_suchen("alice"), Some(c2));
    }

    #[test]
    fn namenswechsel_loest_alten_namen() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();

        registry.aktualisieren(c1, "alice");
        registry.aktualisieren(c1, "bob");

        assert_eq!(registry.verbindung_suchen("alice"), None);
        assert_eq!(registry.verbindung_suchen("bob"), Some(c1));
        assert!(registry.indizes_konsistent());
    }

    #[test]
    fn entfernen_und_lookup_ergibt_none() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();

        registry.speichern(c1, "");
        registry.aktualisieren(c1, "alice");

        assert_eq!(registry.entfernen(&c1).as_deref(), Some("alice"));
        assert_eq!(registry.verbindung_suchen("alice"), None);
        assert!(!registry.ist_registriert(&c1));
    }

    #[test]
    fn doppeltes_entfernen_ist_noop() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        registry.speichern(c1, "");
        registry.aktualisieren(c2, "bob");

        assert!(registry.entfernen(&c1).is_some());
        assert!(registry.entfernen(&c1).is_none());
        assert_eq!(registry.anzahl(), 1);
        assert_eq!(registry.verbindung_suchen("bob"), Some(c2));
    }

    #[test]
    fn speichern_ist_idempotent() {
        let registry = ConnectionRegistry::neu();
        let c1 = ConnectionId::new();

        registry.speichern(c1, "");
        registry.speichern(c1, "");
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let r1 = ConnectionRegistry::neu();
        let r2 = r1.clone();
        let c1 = ConnectionId::new();

        r1.aktualisieren(c1, "shared");
        assert_eq!(r2.verbindung_suchen("shared"), Some(c1));
    }

    #[test]
    fn nebenlaeufige_bindungen_bleiben_eindeutig() {
        let registry = ConnectionRegistry::neu();
        let namen = ["alice", "bob", "carol"];

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = ConnectionId::new();
                        registry.speichern(id, "");
                        registry.aktualisieren(id, namen[(t + i) % namen.len()]);
                        if i % 3 == 0 {
                            registry.entfernen(&id);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert!(registry.indizes_konsistent());
        // Kein Name darf von zwei Verbindungen beansprucht werden
        for name in namen {
            let mit_namen = {
                let inner = registry.inner.lock();
                inner
                    .benutzer_nach_verbindung
                    .values()
                    .filter(|n| n.as_str() == name)
                    .count()
            };
            assert!(mit_namen <= 1, "{name} ist mehrfach gebunden");
            assert_eq!(mit_namen == 1, registry.verbindung_suchen(name).is_some());
        }
    }
}
