//! Built-in mapping profiles
//!
//! One profile per vehicle family, selected at runtime by matching the
//! object-class signal. Profiles are plain data; custom ones can be
//! loaded from TOML files with the same shape by the application layer.
//!
//! The lamp logic follows the real MFA panel: every lamp that has both a
//! steady (`IsActive`) and a flashing (`IsFlashing`) source gets two
//! mappings, and the flashing one wins ties only through declaration
//! order where priorities are equal.

use crate::indicator::Indicator;
use crate::mapping::{Condition, Effect, Mapping, PollSettings, Profile};
use crate::source::stream::{lamp, names};

/// Standard blink half-period of the panel lamps
const BLINK_MS: u32 = 1000;

/// All built-in profiles, in selection order
pub fn builtin_profiles() -> Vec<Profile> {
    vec![
        br101_profile(),
        vectron_profile(),
        stream_profile(),
    ]
}

/// BR101 (Expert) and similar German vehicles exposing the
/// `MFA_Indicators` component: every lamp is a pair of plain booleans.
/// Also fits the Bpmmbdzf cab car, which shares the locomotive's safety
/// systems.
pub fn br101_profile() -> Profile {
    const MFA: &str = "CurrentFormation/0/MFA_Indicators.Property.";
    const SIFA: &str = "CurrentFormation/0/BP_Sifa_Service.Property.";
    let mfa = |suffix: &str| format!("{}{}", MFA, suffix);

    let mut mappings = vec![
        // SIFA: visual warning and penalty brake both light the lamp
        // steadily; the penalty wins so a later warning cannot clear it
        Mapping::new(
            "SIFA warning (visual)",
            Indicator::Sifa,
            Condition::is_true(format!("{}WarningStateVisual", SIFA)),
            Effect::On,
        ),
        Mapping::new(
            "SIFA penalty brake",
            Indicator::Sifa,
            Condition::is_true(format!("{}inPenaltyBrakeApplication", SIFA)),
            Effect::On,
        )
        .with_priority(10),
        // 1000 Hz
        Mapping::new(
            "1000Hz steady",
            Indicator::Hz1000,
            Condition::is_true(mfa("1000Hz_IsActive_PZB")),
            Effect::On,
        ),
        Mapping::new(
            "1000Hz flashing",
            Indicator::Hz1000,
            Condition::is_true(mfa("1000Hz_IsFlashing_PZB")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        Mapping::new(
            "1000Hz flashing (brake test)",
            Indicator::Hz1000,
            Condition::is_true(mfa("1000Hz_IsFlashing_BP")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        // 500 Hz has no flashing source on this vehicle
        Mapping::new(
            "500Hz steady",
            Indicator::Hz500,
            Condition::is_true(mfa("500Hz_IsActive")),
            Effect::On,
        ),
        // LZB Ende
        Mapping::new(
            "LZB Ende steady",
            Indicator::LzbEnde,
            Condition::is_true(mfa("Ende_IsActive")),
            Effect::On,
        ),
        Mapping::new(
            "LZB Ende flashing",
            Indicator::LzbEnde,
            Condition::is_true(mfa("Ende_IsFlashing")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        // LZB Ü
        Mapping::new(
            "LZB Ü steady",
            Indicator::LzbUe,
            Condition::is_true(mfa("Ü_IsActive")),
            Effect::On,
        ),
        Mapping::new(
            "LZB Ü flashing",
            Indicator::LzbUe,
            Condition::is_true(mfa("Ü_IsFlashing")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        Mapping::new(
            "LZB Ü flashing (fault)",
            Indicator::LzbUe,
            Condition::is_true(mfa("Ü_IsFlashing_LZB_Fault")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(3),
        // LZB G
        Mapping::new(
            "LZB G steady (LZB)",
            Indicator::LzbG,
            Condition::is_true(mfa("G_IsActive_LZB")),
            Effect::On,
        ),
        Mapping::new(
            "LZB G steady (PZB)",
            Indicator::LzbG,
            Condition::is_true(mfa("G_IsActive_PZB")),
            Effect::On,
        ),
        Mapping::new(
            "LZB G flashing",
            Indicator::LzbG,
            Condition::is_true(mfa("G_IsFlashing_LZB")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        // LZB S
        Mapping::new(
            "LZB S steady (LZB)",
            Indicator::LzbS,
            Condition::is_true(mfa("S_IsActive_LZB")),
            Effect::On,
        ),
        Mapping::new(
            "LZB S steady (PZB)",
            Indicator::LzbS,
            Condition::is_true(mfa("S_IsActive_PZB")),
            Effect::On,
        ),
        Mapping::new(
            "LZB S flashing",
            Indicator::LzbS,
            Condition::is_true(mfa("S_IsFlashing_LZB")),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        // Befehl 40
        Mapping::new(
            "Befehl 40 steady",
            Indicator::Befehl40,
            Condition::is_true(mfa("B_IsActive")),
            Effect::On,
        ),
        // Doors: the lock signal is active-low (false = released) and
        // covers both sides on this vehicle
        Mapping::new(
            "Doors left released",
            Indicator::DoorsLeft,
            Condition::is_false("CurrentFormation/0.Property.DoorLockSignal"),
            Effect::On,
        ),
        Mapping::new(
            "Doors right released",
            Indicator::DoorsRight,
            Condition::is_false("CurrentFormation/0.Property.DoorLockSignal"),
            Effect::On,
        ),
    ];

    // Train categories 55/70/85: steady, flashing, and the base-data
    // (Grunddaten) flash that only applies below the base-data speed
    for (indicator, prefix) in [
        (Indicator::Pzb55, "55"),
        (Indicator::Pzb70, "70"),
        (Indicator::Pzb85, "85"),
    ] {
        mappings.push(Mapping::new(
            format!("PZB {} steady", prefix),
            indicator,
            Condition::is_true(mfa(&format!("{}_IsActive_PZB", prefix))),
            Effect::On,
        ));
        mappings.push(Mapping::new(
            format!("PZB {} steady (train data)", prefix),
            indicator,
            Condition::is_true(mfa(&format!("{}_IsActive_TrainData", prefix))),
            Effect::On,
        ));
        mappings.push(
            Mapping::new(
                format!("PZB {} flashing", prefix),
                indicator,
                Condition::is_true(mfa(&format!("{}_IsFlashing_PZB", prefix))),
                Effect::Blink(BLINK_MS),
            )
            .with_priority(1),
        );
        mappings.push(
            Mapping::new(
                format!("PZB {} flashing (base data)", prefix),
                indicator,
                Condition::is_true(mfa(&format!("{}_IsFlashing_Grunddaten", prefix))),
                Effect::Blink(BLINK_MS),
            )
            .with_priority(1)
            .suppressed_by(Condition::is_false(mfa("IsBelowGrunddatenSpeed"))),
        );
    }

    Profile {
        name: "BR101 (Expert)".into(),
        description: "MFA_Indicators vehicles: BR101, Bpmmbdzf cab car".into(),
        vehicle_classes: vec!["BR101".into(), "Bpmmbdzf".into()],
        mappings,
        poll: PollSettings::default(),
    }
}

/// DB Vectron: no MFA_Indicators component. PZB lamp states come out of
/// the `Get_InfluenceState` record via `value_key`; LZB uses discrete
/// state properties (`EndeState` 1 = awaiting acknowledge → flash,
/// 2 = acknowledged → steady). While LZB supervision is up, every PZB
/// lamp is forced dark.
pub fn vectron_profile() -> Profile {
    const PZB_FN: &str = "CurrentFormation/0/PZB_Service_V3.Function.";
    const PZB_PR: &str = "CurrentFormation/0/PZB_Service_V3.Property.";
    const LZB_PR: &str = "CurrentFormation/0/LZB_Service.Property.";
    const SIFA: &str = "CurrentFormation/0/BP_Sifa_Service.Property.";
    let influence = || format!("{}Get_InfluenceState", PZB_FN);
    let lzb_supervising = || Condition::is_true(format!("{}ULightState", LZB_PR));

    let mut mappings = vec![
        Mapping::new(
            "SIFA warning (visual)",
            Indicator::Sifa,
            Condition::is_true(format!("{}WarningStateVisual", SIFA)),
            Effect::On,
        ),
        Mapping::new(
            "SIFA penalty brake",
            Indicator::Sifa,
            Condition::is_true(format!("{}inPenaltyBrakeApplication", SIFA)),
            Effect::On,
        )
        .with_priority(10),
        Mapping::new(
            "1000Hz influence",
            Indicator::Hz1000,
            Condition::is_true(influence()).with_key("1000Hz_Active"),
            Effect::On,
        ),
        Mapping::new(
            "500Hz influence",
            Indicator::Hz500,
            Condition::is_true(influence()).with_key("500Hz_Active"),
            Effect::On,
        ),
        // Category lamps are driven by the magnet states on this vehicle
        Mapping::new(
            "85 after 1000Hz",
            Indicator::Pzb85,
            Condition::is_true(influence()).with_key("1000Hz_Active"),
            Effect::On,
        ),
        Mapping::new(
            "85 restricted",
            Indicator::Pzb85,
            Condition::is_true(influence()).with_key("isRestricted"),
            Effect::On,
        ),
        Mapping::new(
            "85 emergency",
            Indicator::Pzb85,
            Condition::is_true(format!("{}_InEmergency", PZB_PR)),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(5),
        Mapping::new(
            "70 after 500Hz",
            Indicator::Pzb70,
            Condition::is_true(influence()).with_key("500Hz_Active"),
            Effect::On,
        ),
        Mapping::new(
            "55 after 2000Hz",
            Indicator::Pzb55,
            Condition::is_true(influence()).with_key("2000Hz_Active"),
            Effect::On,
        ),
        // LZB Ende: 1 = flash until acknowledged, 2 = steady
        Mapping::new(
            "LZB Ende acknowledged",
            Indicator::LzbEnde,
            Condition::equals(format!("{}EndeState", LZB_PR), 2),
            Effect::On,
        ),
        Mapping::new(
            "LZB Ende awaiting acknowledge",
            Indicator::LzbEnde,
            Condition::equals(format!("{}EndeState", LZB_PR), 1),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(1),
        Mapping::new(
            "LZB Ü supervising",
            Indicator::LzbUe,
            lzb_supervising(),
            Effect::On,
        ),
        Mapping::new(
            "LZB Ü fault",
            Indicator::LzbUe,
            Condition::is_true(format!("{}FaultCode", LZB_PR)),
            Effect::Blink(BLINK_MS),
        )
        .with_priority(3),
        Mapping::new(
            "Doors left released",
            Indicator::DoorsLeft,
            Condition::is_false("CurrentFormation/0.Property.DoorLockSignal"),
            Effect::On,
        ),
        Mapping::new(
            "Doors right released",
            Indicator::DoorsRight,
            Condition::is_false("CurrentFormation/0.Property.DoorLockSignal"),
            Effect::On,
        ),
    ];

    // LZB supervision blanks the whole PZB lamp group
    let pzb_lamps = [
        Indicator::Pzb85,
        Indicator::Pzb70,
        Indicator::Pzb55,
        Indicator::Hz1000,
        Indicator::Hz500,
    ];
    for mapping in &mut mappings {
        if pzb_lamps.contains(&mapping.indicator) {
            mapping.suppress_by = Some(lzb_supervising());
        }
    }

    Profile {
        name: "DB Vectron".into(),
        description: "PZB_Service_V3 / LZB_Service vehicles without an MFA panel".into(),
        vehicle_classes: vec!["Vectron".into()],
        mappings,
        poll: PollSettings::default(),
    }
}

/// Profile for the streaming cab-data protocol: the simulator already
/// resolves lamp states, so mappings match the discrete scale exactly
/// (1 = steady, 2 = blink, 3 = inverted blink — rendered as blink; the
/// anti-phase pairing is the renderer's job, not the protocol's).
pub fn stream_profile() -> Profile {
    let lamp_mappings = |signal: &str, indicator: Indicator| {
        vec![
            Mapping::new(
                format!("{} steady", signal),
                indicator,
                Condition::equals(signal, lamp::ON),
                Effect::On,
            ),
            Mapping::new(
                format!("{} blinking", signal),
                indicator,
                Condition::equals(signal, lamp::BLINK),
                Effect::Blink(BLINK_MS),
            )
            .with_priority(1),
            Mapping::new(
                format!("{} blinking (inverted)", signal),
                indicator,
                Condition::equals(signal, lamp::BLINK_INVERTED),
                Effect::Blink(BLINK_MS),
            )
            .with_priority(1),
        ]
    };

    let mut mappings = vec![Mapping::new(
        "SIFA lamp",
        Indicator::Sifa,
        Condition::is_true(names::SIFA_LAMP),
        Effect::On,
    )];
    for (signal, indicator) in [
        (names::PZB_LM_1000HZ, Indicator::Hz1000),
        (names::PZB_LM_500HZ, Indicator::Hz500),
        (names::PZB_LM_BEFEHL, Indicator::Befehl40),
        (names::PZB_ZUGART_55, Indicator::Pzb55),
        (names::PZB_ZUGART_70, Indicator::Pzb70),
        (names::PZB_ZUGART_85, Indicator::Pzb85),
        (names::LZB_LM_UE, Indicator::LzbUe),
        (names::LZB_LM_G, Indicator::LzbG),
        (names::LZB_LM_S, Indicator::LzbS),
        (names::LZB_LM_ENDE, Indicator::LzbEnde),
    ] {
        mappings.extend(lamp_mappings(signal, indicator));
    }
    mappings.push(
        Mapping::new(
            "PZB emergency braking",
            Indicator::Pzb85,
            Condition::is_true(names::PZB_EMERGENCY),
            Effect::Blink(500),
        )
        .with_priority(10),
    );
    mappings.push(Mapping::new(
        "Doors left",
        Indicator::DoorsLeft,
        Condition::is_true(names::DOORS_LEFT),
        Effect::On,
    ));
    mappings.push(Mapping::new(
        "Doors right",
        Indicator::DoorsRight,
        Condition::is_true(names::DOORS_RIGHT),
        Effect::On,
    ));

    Profile {
        name: "Streaming cab data".into(),
        description: "Resolved lamp states from the binary TCP stream".into(),
        vehicle_classes: vec![],
        mappings,
        poll: PollSettings::default(),
    }
}
