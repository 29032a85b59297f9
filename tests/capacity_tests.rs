use lrts::capacity::{CapacityMode, CoreCountProbe, SystemCoreCount};
use lrts::error::LrtsError;

/// A probe reporting a fixed topology.
struct FakeProbe {
    physical: Option<u32>,
    logical: u32,
}

impl CoreCountProbe for FakeProbe {
    fn physical_cores(&self) -> Option<u32> {
        self.physical
    }

    fn logical_cores(&self) -> u32 {
        self.logical
    }
}

#[test]
fn test_flag_positive_is_explicit() {
    assert_eq!(CapacityMode::from_flag(3).unwrap(), CapacityMode::Explicit(3));
    assert_eq!(CapacityMode::from_flag(1).unwrap(), CapacityMode::Explicit(1));
}

#[test]
fn test_flag_negative_encodings() {
    assert_eq!(
        CapacityMode::from_flag(-1).unwrap(),
        CapacityMode::PhysicalCores
    );
    assert_eq!(
        CapacityMode::from_flag(-2).unwrap(),
        CapacityMode::LogicalCores
    );
    assert_eq!(
        CapacityMode::from_flag(-3).unwrap(),
        CapacityMode::PhysicalCoresMinusOne
    );
    assert_eq!(
        CapacityMode::from_flag(-4).unwrap(),
        CapacityMode::LogicalCoresMinusOne
    );
}

#[test]
fn test_flag_rejects_zero_and_unknown_negatives() {
    assert!(matches!(
        CapacityMode::from_flag(0),
        Err(LrtsError::InvalidCapacity(0))
    ));
    assert!(matches!(
        CapacityMode::from_flag(-5),
        Err(LrtsError::InvalidCapacity(-5))
    ));
}

#[test]
fn test_resolve_explicit() {
    let probe = FakeProbe {
        physical: Some(8),
        logical: 16,
    };
    assert_eq!(CapacityMode::Explicit(3).resolve(&probe), 3);
}

#[test]
fn test_resolve_core_modes() {
    let probe = FakeProbe {
        physical: Some(8),
        logical: 16,
    };
    assert_eq!(CapacityMode::PhysicalCores.resolve(&probe), 8);
    assert_eq!(CapacityMode::LogicalCores.resolve(&probe), 16);
    assert_eq!(CapacityMode::PhysicalCoresMinusOne.resolve(&probe), 7);
    assert_eq!(CapacityMode::LogicalCoresMinusOne.resolve(&probe), 15);
}

#[test]
fn test_resolve_never_below_one() {
    let single = FakeProbe {
        physical: Some(1),
        logical: 1,
    };
    assert_eq!(CapacityMode::PhysicalCoresMinusOne.resolve(&single), 1);
    assert_eq!(CapacityMode::LogicalCoresMinusOne.resolve(&single), 1);
}

#[test]
fn test_resolve_falls_back_to_logical_when_physical_unknown() {
    let probe = FakeProbe {
        physical: None,
        logical: 4,
    };
    assert_eq!(CapacityMode::PhysicalCores.resolve(&probe), 4);
    assert_eq!(CapacityMode::PhysicalCoresMinusOne.resolve(&probe), 3);
}

#[test]
fn test_system_probe_reports_sane_counts() {
    let probe = SystemCoreCount;
    assert!(probe.logical_cores() >= 1);
    if let Some(physical) = probe.physical_cores() {
        assert!(physical >= 1);
        assert!(physical <= probe.logical_cores());
    }
}
