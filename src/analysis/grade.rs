use crate::error::{EngineResult, MatchError};
use crate::types::{AllelePair, ImmuneGroup, MatchGrade};

/// Classify one recipient allele pair against one donor allele pair.
///
/// The comparison is directional: swapping recipient and donor swaps
/// `HvgNonpermissive` and `GvhNonpermissive`.
pub fn classify(recipient: &AllelePair, donor: &AllelePair) -> MatchGrade {
    if recipient.type_equals(donor) {
        return MatchGrade::Match;
    }

    let (recip_low, recip_high, donor_low, donor_high) = match (
        recipient.low_group(),
        recipient.high_group(),
        donor.low_group(),
        donor.high_group(),
    ) {
        (Some(rl), Some(rh), Some(dl), Some(dh)) => (rl, rh, dl, dh),
        _ => return MatchGrade::Unknown,
    };

    match (recip_high.is_unassigned(), donor_high.is_unassigned()) {
        (true, true) => MatchGrade::Permissive,
        (true, false) => MatchGrade::GvhNonpermissive,
        (false, true) => MatchGrade::HvgNonpermissive,
        (false, false) => {
            let recip_low = elevated(recip_low, recip_high);
            let donor_low = elevated(donor_low, donor_high);
            match recip_low.cmp(&donor_low) {
                std::cmp::Ordering::Equal => MatchGrade::Permissive,
                std::cmp::Ordering::Greater => MatchGrade::HvgNonpermissive,
                std::cmp::Ordering::Less => MatchGrade::GvhNonpermissive,
            }
        }
    }
}

fn elevated(low: ImmuneGroup, high: ImmuneGroup) -> ImmuneGroup {
    if low.is_unassigned() {
        high
    } else {
        low
    }
}

/// Which pure grades carry a non-zero rounded probability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeFlags {
    pub matched: bool,
    pub permissive: bool,
    pub hvg: bool,
    pub gvh: bool,
    pub unknown: bool,
}

/// Resolve the overall grade, in priority order
/// `Match > Permissive > HvgNonpermissive > GvhNonpermissive > Unknown`.
pub fn resolve_overall_grade(flags: GradeFlags) -> EngineResult<MatchGrade> {
    let GradeFlags {
        matched,
        permissive,
        hvg,
        gvh,
        unknown,
    } = flags;

    let grade = match () {
        _ if matched && (permissive || hvg || gvh || unknown) => MatchGrade::Potential,
        _ if matched => MatchGrade::Match,
        _ if permissive && (hvg || gvh || unknown) => MatchGrade::Potential,
        _ if permissive => MatchGrade::Permissive,
        _ if hvg && (gvh || unknown) => MatchGrade::NonpermissiveUndefined,
        _ if hvg => MatchGrade::HvgNonpermissive,
        _ if gvh && unknown => MatchGrade::NonpermissiveUndefined,
        _ if gvh => MatchGrade::GvhNonpermissive,
        _ if unknown => MatchGrade::Unknown,
        _ => return Err(MatchError::NoGradeResolved),
    };
    Ok(grade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Allele, DetailRace};

    fn pair(a1: &str, g1: Option<ImmuneGroup>, a2: &str, g2: Option<ImmuneGroup>) -> AllelePair {
        AllelePair::new(
            Allele::new(a1).unwrap(),
            g1,
            Allele::new(a2).unwrap(),
            g2,
            DetailRace::Unk,
        )
    }

    const U: Option<ImmuneGroup> = Some(ImmuneGroup::Unassigned);

    fn g(n: u32) -> Option<ImmuneGroup> {
        Some(ImmuneGroup::Group(n))
    }

    #[test]
    fn test_identical_alleles_match_regardless_of_groups() {
        let r = pair("HLA-DPB1*04:01", g(3), "HLA-DPB1*02:01", g(3));
        let d = pair("HLA-DPB1*04:01", None, "HLA-DPB1*02:01", g(1));
        assert_eq!(classify(&r, &d), MatchGrade::Match);
        assert_eq!(classify(&r, &r), MatchGrade::Match);
    }

    #[test]
    fn test_unresolved_group_is_unknown() {
        let r = pair("HLA-DPB1*04:01", g(3), "HLA-DPB1*999:01", None);
        let d = pair("HLA-DPB1*02:01", g(3), "HLA-DPB1*02:01", g(3));
        assert_eq!(classify(&r, &d), MatchGrade::Unknown);
        assert_eq!(classify(&d, &r), MatchGrade::Unknown);
    }

    #[test]
    fn test_both_unassigned_is_permissive() {
        let r = pair("HLA-DPB1*04:01", U, "HLA-DPB1*04:02", U);
        let d = pair("HLA-DPB1*02:01", U, "HLA-DPB1*02:02", U);
        assert_eq!(classify(&r, &d), MatchGrade::Permissive);
    }

    #[test]
    fn test_one_side_unassigned() {
        let unassigned = pair("HLA-DPB1*04:01", U, "HLA-DPB1*04:02", U);
        let grouped = pair("HLA-DPB1*09:01", g(1), "HLA-DPB1*04:01", U);
        assert_eq!(classify(&unassigned, &grouped), MatchGrade::GvhNonpermissive);
        assert_eq!(classify(&grouped, &unassigned), MatchGrade::HvgNonpermissive);
    }

    #[test]
    fn test_low_group_comparison() {
        let r = pair("HLA-DPB1*04:01", g(3), "HLA-DPB1*04:02", g(3));
        let d = pair("HLA-DPB1*09:01", g(1), "HLA-DPB1*04:01", g(3));
        assert_eq!(classify(&r, &d), MatchGrade::HvgNonpermissive);
        assert_eq!(classify(&d, &r), MatchGrade::GvhNonpermissive);

        let d_same = pair("HLA-DPB1*02:01", g(3), "HLA-DPB1*04:02", g(3));
        assert_eq!(classify(&r, &d_same), MatchGrade::Permissive);
    }

    #[test]
    fn test_unassigned_low_takes_high() {
        // recipient (-, 2) compares as 2, donor (1, 3) compares as 1
        let r = pair("HLA-DPB1*04:01", U, "HLA-DPB1*03:01", g(2));
        let d = pair("HLA-DPB1*09:01", g(1), "HLA-DPB1*04:02", g(3));
        assert_eq!(classify(&r, &d), MatchGrade::HvgNonpermissive);

        let d_two = pair("HLA-DPB1*02:01", U, "HLA-DPB1*03:01", g(2));
        assert_eq!(classify(&r, &d_two), MatchGrade::Permissive);
    }

    #[test]
    fn test_group_zero_is_not_the_sentinel() {
        let r = pair("HLA-DPB1*04:01", g(0), "HLA-DPB1*04:02", g(0));
        let d = pair("HLA-DPB1*02:01", U, "HLA-DPB1*02:02", U);
        assert_eq!(classify(&r, &d), MatchGrade::HvgNonpermissive);
    }

    fn flags(matched: bool, permissive: bool, hvg: bool, gvh: bool, unknown: bool) -> GradeFlags {
        GradeFlags {
            matched,
            permissive,
            hvg,
            gvh,
            unknown,
        }
    }

    #[test]
    fn test_resolve_single_grades() {
        assert_eq!(
            resolve_overall_grade(flags(true, false, false, false, false)),
            Ok(MatchGrade::Match)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, true, false, false, false)),
            Ok(MatchGrade::Permissive)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, false, true, false, false)),
            Ok(MatchGrade::HvgNonpermissive)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, false, false, true, false)),
            Ok(MatchGrade::GvhNonpermissive)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, false, false, false, true)),
            Ok(MatchGrade::Unknown)
        );
    }

    #[test]
    fn test_resolve_mixtures() {
        assert_eq!(
            resolve_overall_grade(flags(true, false, false, false, true)),
            Ok(MatchGrade::Potential)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, true, false, true, false)),
            Ok(MatchGrade::Potential)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, false, true, true, false)),
            Ok(MatchGrade::NonpermissiveUndefined)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, false, true, false, true)),
            Ok(MatchGrade::NonpermissiveUndefined)
        );
        assert_eq!(
            resolve_overall_grade(flags(false, false, false, true, true)),
            Ok(MatchGrade::NonpermissiveUndefined)
        );
    }

    #[test]
    fn test_resolve_without_flags_is_invariant_violation() {
        assert_eq!(
            resolve_overall_grade(GradeFlags::default()),
            Err(MatchError::NoGradeResolved)
        );
    }
}
