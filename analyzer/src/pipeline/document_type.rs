use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    RentalAgreement,
    EmploymentContract,
    ServiceAgreement,
    LoanAgreement,
    Nda,
    PurchaseAgreement,
    InternshipAgreement,
    GeneralLegalDocument,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RentalAgreement => "rental agreement",
            Self::EmploymentContract => "employment contract",
            Self::ServiceAgreement => "service agreement",
            Self::LoanAgreement => "loan agreement",
            Self::Nda => "nda",
            Self::PurchaseAgreement => "purchase agreement",
            Self::InternshipAgreement => "internship agreement",
            Self::GeneralLegalDocument => "general legal document",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DocumentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Declaration order is the tie-break order.
const PATTERNS: &[(DocumentType, &[&str])] = &[
    (
        DocumentType::RentalAgreement,
        &["rent", "lease", "tenant", "landlord", "security deposit"],
    ),
    (
        DocumentType::EmploymentContract,
        &["employment", "employee", "employer", "salary", "position"],
    ),
    (
        DocumentType::ServiceAgreement,
        &["service", "provider", "client", "deliverable"],
    ),
    (
        DocumentType::LoanAgreement,
        &["loan", "borrower", "lender", "interest rate"],
    ),
    (
        DocumentType::Nda,
        &["confidential", "non-disclosure", "secrecy"],
    ),
    (
        DocumentType::PurchaseAgreement,
        &["purchase", "buy", "sell", "buyer", "seller"],
    ),
    (
        DocumentType::InternshipAgreement,
        &["internship", "intern", "supervisor", "internship period"],
    ),
];

/// Labels the document by whichever pattern has the most keywords present
/// (plain substring match on the lower-cased text).
pub fn detect_document_type(text: &str) -> DocumentType {
    let lowered = text.to_lowercase();

    let mut best = DocumentType::GeneralLegalDocument;
    let mut best_score = 0usize;
    for (doc_type, keywords) in PATTERNS {
        let score = keywords
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .count();
        if score > best_score {
            best = *doc_type;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_vocabulary_is_a_rental_agreement() {
        assert_eq!(
            detect_document_type("lease tenant landlord"),
            DocumentType::RentalAgreement
        );
        assert_eq!(
            detect_document_type("lease tenant landlord").as_str(),
            "rental agreement"
        );
    }

    #[test]
    fn no_keywords_is_general() {
        assert_eq!(
            detect_document_type("Minutes of the quarterly meeting."),
            DocumentType::GeneralLegalDocument
        );
        assert_eq!(detect_document_type(""), DocumentType::GeneralLegalDocument);
    }

    #[test]
    fn ties_go_to_the_earlier_pattern() {
        // one rental keyword, one loan keyword
        assert_eq!(
            detect_document_type("The TENANT repays the LOAN."),
            DocumentType::RentalAgreement
        );
        // one nda keyword, one purchase keyword
        assert_eq!(
            detect_document_type("Confidential purchase"),
            DocumentType::Nda
        );
    }

    #[test]
    fn highest_count_wins() {
        let text = "The Employer shall pay the Employee a salary for the position. Tenant.";
        assert_eq!(detect_document_type(text), DocumentType::EmploymentContract);
    }

    #[test]
    fn serializes_as_label() {
        let value = serde_json::to_value(DocumentType::Nda).unwrap();
        assert_eq!(value, "nda");
    }
}
