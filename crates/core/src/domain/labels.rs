use std::collections::BTreeMap;

use serde::Serialize;

const QUOTATION_STATUSES: &[(i64, &str)] = &[
    (1, "Nouveau"),
    (2, "Ouvert"),
    (3, "Brouillon"),
    (4, "Publié"),
    (5, "Auto validé"),
    (6, "Facturé"),
    (9, "Refusé"),
    (12, "Envoyé au client"),
    (13, "En attente validation interne"),
    (14, "A transmettre au client"),
    (15, "En cours"),
    (16, "Accepté"),
    (17, "Expiré"),
    (18, "Lu"),
    (90, "Envoyé en signature"),
    (91, "Signé"),
    (92, "Signature refusée"),
    (100, "Terminé"),
    (101, "Perdu"),
    (102, "Annulé"),
];

const ORDER_STATUSES: &[(i64, &str)] = &[
    (1, "Brouillon"),
    (2, "Envoyé pour validation"),
    (3, "Annulé"),
    (4, "Validé"),
    (5, "Auto validé"),
    (6, "Facturé"),
    (7, "Payé"),
    (8, "Paiement Partiel"),
    (9, "Refusé"),
    (10, "Révision"),
    (11, "Remboursement effectué"),
    (12, "Envoyé au client"),
    (13, "En attente validation interne"),
    (14, "A transmettre au client"),
    (15, "En cours"),
    (16, "Accepté"),
    (17, "Expiré"),
    (18, "Lu"),
    (20, "En Att. de paiement"),
    (21, "Partiellement Facturé"),
    (89, "Envoyé au PDP"),
    (90, "Envoyé en signature"),
    (91, "Signé"),
    (92, "Signature refusée"),
    (99, "Relance pour impayé"),
    (100, "Terminé"),
    (101, "Perdu"),
    (102, "Annulé"),
];

const OPPORTUNITY_STAGES: &[(i64, &str)] = &[
    (1, "Qualification"),
    (2, "Besoin d'info."),
    (3, "Proposition"),
    (4, "Négociation"),
    (5, "Gagné"),
    (99, "Perdu"),
    (100, "Annulé"),
];

const OPPORTUNITY_TYPES: &[(i64, &str)] =
    &[(1, "Business Existant"), (2, "Nouveau Business"), (3, "Consulting")];

/// Display labels for CRM codes. Built once at startup and shared read-only;
/// nothing in the calculation path reads labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusLabels {
    pub quotation_statuses: BTreeMap<i64, String>,
    pub order_statuses: BTreeMap<i64, String>,
    pub opportunity_stages: BTreeMap<i64, String>,
    pub opportunity_types: BTreeMap<i64, String>,
}

fn table(entries: &[(i64, &str)]) -> BTreeMap<i64, String> {
    entries.iter().map(|(code, label)| (*code, (*label).to_string())).collect()
}

fn lookup(table: &BTreeMap<i64, String>, code: &str, prefix: &str) -> String {
    code.parse::<i64>()
        .ok()
        .and_then(|key| table.get(&key).cloned())
        .unwrap_or_else(|| format!("{prefix} {code}"))
}

impl StatusLabels {
    pub fn nicoka() -> Self {
        Self {
            quotation_statuses: table(QUOTATION_STATUSES),
            order_statuses: table(ORDER_STATUSES),
            opportunity_stages: table(OPPORTUNITY_STAGES),
            opportunity_types: table(OPPORTUNITY_TYPES),
        }
    }

    pub fn quotation_status(&self, code: &str) -> String {
        lookup(&self.quotation_statuses, code, "Statut")
    }

    pub fn order_status(&self, code: &str) -> String {
        lookup(&self.order_statuses, code, "Statut")
    }

    pub fn opportunity_stage(&self, code: &str) -> String {
        lookup(&self.opportunity_stages, code, "Étape")
    }

    pub fn opportunity_type(&self, code: &str) -> String {
        lookup(&self.opportunity_types, code, "Type")
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self::nicoka()
    }
}

#[cfg(test)]
mod tests {
    use super::StatusLabels;

    #[test]
    fn known_codes_resolve_to_labels() {
        let labels = StatusLabels::nicoka();
        assert_eq!(labels.quotation_status("91"), "Signé");
        assert_eq!(labels.order_status("21"), "Partiellement Facturé");
        assert_eq!(labels.opportunity_stage("4"), "Négociation");
        assert_eq!(labels.opportunity_type("3"), "Consulting");
    }

    #[test]
    fn unknown_codes_fall_back_to_prefixed_code() {
        let labels = StatusLabels::nicoka();
        assert_eq!(labels.quotation_status("42"), "Statut 42");
        assert_eq!(labels.opportunity_stage("x"), "Étape x");
        assert_eq!(labels.opportunity_type("0"), "Type 0");
    }
}
