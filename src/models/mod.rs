pub mod claim;
pub mod common;
pub mod evidence;
pub mod feedback;
pub mod result;
pub mod validate;
pub mod verdict;

pub use claim::{Claim, ClaimDecomposition, ClaimType, SubClaim};
pub use common::{Id, IsoDateTime};
pub use evidence::{Credibility, EvidenceRecord, Source};
pub use feedback::{HumanFeedback, SubClaimFeedback};
pub use result::{FactCheckResult, Synthesis};
pub use validate::Validate;
pub use verdict::{SubClaimVerdict, Verdict};
