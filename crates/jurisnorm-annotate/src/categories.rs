//! Which categories the annotation service is asked to detect.

use jurisnorm_core::Category;

/// Categories subject to per-decision omission.
pub const ANNOTATABLE: [Category; 16] = [
    Category::NaturalPerson,
    Category::BirthDate,
    Category::MarriageDate,
    Category::DeathDate,
    Category::IdentifyingNumber,
    Category::LegalPerson,
    Category::Establishment,
    Category::CompanyNumber,
    Category::Address,
    Category::Locality,
    Category::PhoneFax,
    Category::Email,
    Category::SensitiveWebsite,
    Category::BankAccount,
    Category::LandRegistry,
    Category::LicensePlate,
];

/// Always requested, whatever the decision omits.
pub const ALWAYS_ANNOTATED: [Category; 2] = [Category::MagistrateOrClerk, Category::Lawyer];

/// [`ANNOTATABLE`] minus `omitted`, then [`ALWAYS_ANNOTATED`].
pub fn allow_list(omitted: &[Category]) -> Vec<Category> {
    ANNOTATABLE
        .into_iter()
        .filter(|c| !omitted.contains(c))
        .chain(ALWAYS_ANNOTATED)
        .collect()
}
