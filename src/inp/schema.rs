//! Section schema registry
//!
//!     Every bracketed section of the INP dialect is described by one immutable
//!     `SectionSchema`: its ordered field table, identity rule, token-shape rule,
//!     subclass join table, and layout. The registry is a static slice in
//!     canonical file order — behavior is dispatched on `SectionKind`, never by
//!     name lookup, and the grammar lives in data rather than in per-section
//!     parsing code.
//!
//!     The shape rules cover the variant line forms of the format: sections
//!     whose token count depends on a marker column (divider type, storage curve
//!     kind, outlet type), sections with optional trailing columns, and the one
//!     section (infiltration) whose entire column set is chosen by a document
//!     option.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::inp::value::FieldType;

/// Kind tag for every section grammar, plus the composite pseudo-schema
/// `NodeInflows` (the union of `Inflows` and `Dwf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    Title,
    Options,
    Files,
    Evaporation,
    Junctions,
    Outfalls,
    Dividers,
    Storage,
    Coordinates,
    Conduits,
    Pumps,
    Orifices,
    Weirs,
    Outlets,
    XSections,
    Losses,
    RainGages,
    Symbols,
    Pollutants,
    LandUses,
    BuildUp,
    WashOff,
    Inflows,
    Dwf,
    Rdii,
    Aquifers,
    Subcatchments,
    Subareas,
    Infiltration,
    Groundwater,
    Coverages,
    Loadings,
    Treatments,
    Vertices,
    Polygons,
    Tags,
    Patterns,
    Curves,
    Hydrographs,
    SnowPacks,
    TimeSeries,
    Controls,
    Transects,
    Report,
    Map,
    Profiles,
    NodeInflows,
}

impl SectionKind {
    /// The element-class name used on the programmatic surface.
    pub fn name(self) -> &'static str {
        schema(self).name
    }

    /// The bracketed section label, used in error messages and on write.
    pub fn label(self) -> &'static str {
        schema(self).label
    }

    /// Resolve an element-class name (case-insensitive) to its kind.
    pub fn from_name(name: &str) -> Option<SectionKind> {
        SCHEMAS
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.kind)
    }
}

/// One column of a section's field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn t(name: &'static str) -> FieldDef {
    FieldDef {
        name,
        ty: FieldType::Text,
    }
}

const fn n(name: &'static str) -> FieldDef {
    FieldDef {
        name,
        ty: FieldType::Number,
    }
}

const fn i(name: &'static str) -> FieldDef {
    FieldDef {
        name,
        ty: FieldType::Int,
    }
}

/// How a section's lines map to records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One whitespace-delimited data line per record, default renderer.
    Table,
    /// Parameter/value lines folded into a single record.
    KeyValue,
    /// Schema-specific extractor and packer (blocks, grouped points, notes).
    Custom,
}

/// Accepted token shapes for a `Table` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeRule {
    /// Token count must equal the field count.
    Exact,
    /// Up to `n` trailing columns may be absent; they parse to null.
    OptionalTail(usize),
    /// One column may be absent; when it is, null is inserted at `index`
    /// (outfalls: a missing `TimeSeriesName` sits mid-row, not at the tail).
    InsertMissing(usize),
    /// Field presence is keyed on a marker column; see `extract::shapes`.
    Marker(MarkerRule),
    /// Column set chosen by the document's infiltration method.
    Infiltration,
}

/// Marker-driven variant shapes, one per section that has them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRule {
    Divider,
    Storage,
    Outlet,
    BuildUp,
    RainGage,
}

/// How a record's identity is synthesized at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRule {
    /// Identity is this field's own value.
    Field(&'static str),
    /// Identity is these fields' values joined with `:`.
    Joined(&'static [&'static str]),
    /// Identity is `<grouping value>:<ordinal>`; duplicates are expected.
    GroupOrdinal,
    /// No identity (single-record sections, or synthesized in custom code).
    None,
}

/// Default filled onto a primary when an optional join has no match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Num(f64),
    Text(&'static str),
}

/// When `add_elements` splits merged entities back into sections, this decides
/// whether a given entity contributes a secondary-section record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitWhen {
    /// Every primary entity gets a secondary record (required joins).
    Always,
    /// Only when at least one non-identity secondary field is set.
    AnyFieldSet,
    /// Only when this particular field is set.
    FieldSet(&'static str),
    /// Only when the secondary fields differ from the declared defaults.
    DiffersFromDefaults,
}

/// One subclass relation: attach `secondary`'s fields onto the primary.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec {
    pub secondary: SectionKind,
    pub required: bool,
    pub defaults: &'static [(&'static str, DefaultValue)],
    pub split_when: SplitWhen,
}

const fn required(secondary: SectionKind) -> JoinSpec {
    JoinSpec {
        secondary,
        required: true,
        defaults: &[],
        split_when: SplitWhen::Always,
    }
}

const fn optional(secondary: SectionKind, split_when: SplitWhen) -> JoinSpec {
    JoinSpec {
        secondary,
        required: false,
        defaults: &[],
        split_when,
    }
}

/// Immutable descriptor for one section grammar.
#[derive(Debug, Clone, Copy)]
pub struct SectionSchema {
    pub kind: SectionKind,
    pub name: &'static str,
    pub label: &'static str,
    pub fields: &'static [FieldDef],
    pub layout: Layout,
    pub shape: ShapeRule,
    /// Cap on whitespace splits for sections whose last column may contain
    /// spaces (formulas, pattern lists); `None` splits on every run.
    pub max_splits: Option<usize>,
    /// Field whose value change resets the synthesized ordinal.
    pub group_field: Option<&'static str>,
    pub identity: IdentityRule,
    /// Field under which this section's descriptions are stored. Secondary
    /// sections use a renamed field so joins never collide on `Description`.
    pub desc_field: &'static str,
    /// Whether comment lines attach as descriptions at all.
    pub descriptions: bool,
    pub joins: &'static [JoinSpec],
    /// Discriminator used when joining against the shared `Tags` section.
    pub tag_type: Option<&'static str>,
}

const JUNCTIONS_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("InvertElevation"),
    n("MaxDepth"),
    n("InitDepth"),
    n("SurchargeDepth"),
    n("PondedArea"),
];

const OUTFALLS_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("InvertElevation"),
    t("OutfallType"),
    t("TimeSeriesName"),
    t("TideGate"),
];

const DIVIDERS_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("InvertElevation"),
    t("DivertedLink"),
    t("DividerType"),
    n("CutoffFlow"),
    t("CurveName"),
    n("MinFlow"),
    n("WeirMaxDepth"),
    n("Coefficient"),
    n("MaxDepth"),
    n("InitDepth"),
    n("SurchargeDepth"),
    n("PondedArea"),
];

const STORAGE_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("InvertElevation"),
    n("MaxDepth"),
    n("InitDepth"),
    t("StorageCurve"),
    t("CurveName"),
    n("CurveCoeff"),
    n("CurveExponent"),
    n("CurveConstant"),
    n("PondedArea"),
    n("EvapFactor"),
    n("SuctionHead"),
    n("Conductivity"),
    n("InitialDeficit"),
];

const COORDINATES_FIELDS: &[FieldDef] = &[t("Name"), n("XCoordinate"), n("YCoordinate")];

const CONDUITS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("InletNode"),
    t("OutletNode"),
    n("Length"),
    n("ManningN"),
    n("InletOffset"),
    n("OutletOffset"),
    n("InitFlow"),
    n("MaxFlow"),
];

const PUMPS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("InletNode"),
    t("OutletNode"),
    t("PumpCurve"),
    t("InitStatus"),
    n("StartupDepth"),
    n("ShutoffDepth"),
];

const ORIFICES_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("InletNode"),
    t("OutletNode"),
    t("Type"),
    n("InletOffset"),
    n("DischargeCoeff"),
    t("FlapGate"),
    n("MoveTime"),
];

const WEIRS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("InletNode"),
    t("OutletNode"),
    t("Type"),
    n("InletOffset"),
    n("DischargeCoeff"),
    t("FlapGate"),
    i("EndContractions"),
    n("EndCoeff"),
];

const OUTLETS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("InletNode"),
    t("OutletNode"),
    n("OutflowHeight"),
    t("OutletType"),
    n("FunctionalCoeff"),
    n("FunctionalExponent"),
    t("CurveName"),
    t("FlapGate"),
];

const XSECTIONS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("PipeShape"),
    t("Geom1"),
    t("Geom2"),
    n("Geom3"),
    n("Geom4"),
    n("Barrels"),
    t("CulvertCode"),
];

const LOSSES_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("EntryLoss"),
    n("ExitLoss"),
    n("AvgLoss"),
    t("FlapGate"),
];

const RAINGAGES_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("RainType"),
    t("Interval"),
    n("SnowCatch"),
    t("Source"),
    t("SourceName"),
    t("StationID"),
    t("Units"),
];

const SYMBOLS_FIELDS: &[FieldDef] = &[t("Name"), n("XCoordinate"), n("YCoordinate")];

const POLLUTANTS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("MassUnits"),
    n("RainConcen"),
    n("GWConcen"),
    n("IIConcen"),
    n("DecayCoeff"),
    t("SnowOnly"),
    t("CoPollutant"),
    n("CoPollutantFraction"),
    n("DWFConcen"),
];

const LANDUSES_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("CleaningInterval"),
    n("Availability"),
    n("LastCleaned"),
];

const BUILDUP_FIELDS: &[FieldDef] = &[
    t("LandUse"),
    t("Pollutant"),
    t("Formula"),
    n("Coeff1"),
    n("Coeff2"),
    n("Coeff3"),
    t("TimeSeries"),
    t("Normalizer"),
];

const WASHOFF_FIELDS: &[FieldDef] = &[
    t("LandUse"),
    t("Pollutant"),
    t("Formula"),
    n("Coeff1"),
    n("Coeff2"),
    n("CleaningEfficiency"),
    n("BMPEfficiency"),
];

const INFLOWS_FIELDS: &[FieldDef] = &[
    t("Node"),
    t("Parameter"),
    t("TimeSeries"),
    t("ParameterType"),
    n("UnitsFactor"),
    n("ScaleFactor"),
    n("BaselineValue"),
    t("BaselinePattern"),
];

const DWF_FIELDS: &[FieldDef] = &[t("Node"), t("Parameter"), n("AvgValue"), t("TimePatterns")];

const NODE_INFLOWS_FIELDS: &[FieldDef] = &[
    t("Node"),
    t("Parameter"),
    t("TimeSeries"),
    t("ParameterType"),
    n("UnitsFactor"),
    n("ScaleFactor"),
    n("BaselineValue"),
    t("BaselinePattern"),
    n("AvgValue"),
    t("TimePatterns"),
];

const RDII_FIELDS: &[FieldDef] = &[t("Name"), t("UnitHydrograph"), n("SewerArea")];

const AQUIFERS_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("Porosity"),
    n("WiltPoint"),
    n("FieldCapacity"),
    n("HydCon"),
    n("CondSlope"),
    n("TensionSlope"),
    n("UpperEvap"),
    n("LowerEvap"),
    n("LowerLoss"),
    n("BottomElev"),
    n("WaterTable"),
    n("UpperMoist"),
];

const SUBCATCHMENTS_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("Raingage"),
    t("Outlet"),
    n("Area"),
    n("PctImperv"),
    n("Width"),
    n("PctSlope"),
    n("CurbLength"),
    t("SnowPack"),
];

const SUBAREAS_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("NImperv"),
    n("NPerv"),
    n("SImperv"),
    n("SPerv"),
    n("PctZero"),
    t("RouteTo"),
    n("PctRouted"),
];

/// Union of both infiltration variants; the active variant's columns are
/// parsed, the inactive variant's columns stay null.
const INFILTRATION_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("SuctionHead"),
    n("HydCon"),
    n("IMDmax"),
    n("MaxRate"),
    n("MinRate"),
    n("Decay"),
    n("DryTime"),
    n("MaxInfil"),
];

/// Green-Ampt column set (`INFILTRATION GREEN_AMPT`).
pub const INFILTRATION_GREEN_AMPT: &[&str] = &["Name", "SuctionHead", "HydCon", "IMDmax"];
/// Horton column set (`INFILTRATION HORTON`).
pub const INFILTRATION_HORTON: &[&str] =
    &["Name", "MaxRate", "MinRate", "Decay", "DryTime", "MaxInfil"];

const GROUNDWATER_FIELDS: &[FieldDef] = &[
    t("Name"),
    t("Aquifer"),
    t("GWReceivingNode"),
    n("GWSurfaceElev"),
    n("GWFlowCoeff"),
    n("GWFlowExpon"),
    n("SWFlowCoeff"),
    n("SWFlowExpon"),
    n("SWGWInteractionCoeff"),
    n("SWFixedDepth"),
    n("GWThresholdElevation"),
];

const COVERAGES_FIELDS: &[FieldDef] = &[t("Subcatchment"), t("LandUse"), n("PercentArea")];

const LOADINGS_FIELDS: &[FieldDef] = &[t("Subcatchment"), t("Pollutant"), n("Loading")];

const TREATMENTS_FIELDS: &[FieldDef] = &[t("Node"), t("Pollutant"), t("Formula")];

const VERTICES_FIELDS: &[FieldDef] = &[t("Link"), n("XCoordinate"), n("YCoordinate")];

const POLYGONS_FIELDS: &[FieldDef] = &[t("Subcatchment"), n("XCoordinate"), n("YCoordinate")];

const TAGS_FIELDS: &[FieldDef] = &[t("Type"), t("Name"), t("Tag")];

const PATTERNS_FIELDS: &[FieldDef] = &[t("Pattern"), t("Type"), n("Multiplier")];

const CURVES_FIELDS: &[FieldDef] = &[t("Curve"), t("Type"), n("XCoordinate"), n("YCoordinate")];

const HYDROGRAPHS_FIELDS: &[FieldDef] = &[
    t("UHGroup"),
    t("Month"),
    t("Response"),
    n("R"),
    n("T"),
    n("K"),
    n("IAmax"),
    n("IArec"),
    n("IAini"),
];

const SNOWPACKS_FIELDS: &[FieldDef] = &[
    t("Name"),
    n("PlowMinCoeff"),
    n("PlowMaxCoeff"),
    n("PlowBaseTemp"),
    n("PlowFFH2OCap"),
    n("PlowInitDepth"),
    n("PlowInitFreeH2O"),
    n("PlowImpAreaFrac"),
    n("ImpvMinCoeff"),
    n("ImpvMaxCoeff"),
    n("ImpvBaseTemp"),
    n("ImpvFFH2OCap"),
    n("ImpvInitDepth"),
    n("ImpvInitFreeH2O"),
    n("ImpvTCDepth"),
    n("PervMinCoeff"),
    n("PervMaxCoeff"),
    n("PervBaseTemp"),
    n("PervFFH2OCap"),
    n("PervInitDepth"),
    n("PervInitFreeH2O"),
    n("PervTCDepth"),
    n("RmvlStartDepth"),
    n("H2OshedExitFrac"),
    n("Trans_to_ImpvFrac"),
    n("Trans_to_PervFrac"),
    n("MeltFrac"),
    n("Trans_to_SubctchFrac"),
    t("RmvlName"),
];

/// Category slices of a snow pack line, in on-disk order. Each slice names the
/// seven parameter columns carried by one `<name> <category> p1..p7` line.
pub const SNOWPACK_SLICES: &[(&str, std::ops::Range<usize>)] = &[
    ("PLOWABLE", 1..8),
    ("IMPERVIOUS", 8..15),
    ("PERVIOUS", 15..22),
    ("REMOVAL", 22..29),
];

const TIMESERIES_FIELDS: &[FieldDef] = &[
    t("TimeSeries"),
    t("FileName"),
    t("DateTime"),
    n("Duration"),
    n("Value"),
];

const CONTROLS_FIELDS: &[FieldDef] = &[t("RuleName"), t("RuleText")];

const TRANSECTS_FIELDS: &[FieldDef] = &[
    t("TransectName"),
    i("StationCount"),
    n("LeftBankRoughness"),
    n("RightBankRoughness"),
    n("ChannelRoughness"),
    n("LeftBankStation"),
    n("RightBankStation"),
    n("StationsModifier"),
    n("ElevationsModifier"),
    n("MeanderModifier"),
    n("Elevation_ft"),
    n("Station_ft"),
];

const OPTIONS_FIELDS: &[FieldDef] = &[
    t("FLOW_UNITS"),
    t("INFILTRATION"),
    t("FLOW_ROUTING"),
    t("START_DATE"),
    t("START_TIME"),
    t("REPORT_START_DATE"),
    t("REPORT_START_TIME"),
    t("END_DATE"),
    t("END_TIME"),
    t("SWEEP_START"),
    t("SWEEP_END"),
    n("DRY_DAYS"),
    t("REPORT_STEP"),
    t("WET_STEP"),
    t("DRY_STEP"),
    t("ROUTING_STEP"),
    t("ALLOW_PONDING"),
    t("INERTIAL_DAMPING"),
    n("VARIABLE_STEP"),
    n("LENGTHENING_STEP"),
    n("MIN_SURFAREA"),
    t("NORMAL_FLOW_LIMITED"),
    t("SKIP_STEADY_STATE"),
    t("FORCE_MAIN_EQUATION"),
    t("LINK_OFFSETS"),
    n("MIN_SLOPE"),
    t("IGNORE_RAINFALL"),
    t("IGNORE_GROUNDWATER"),
];

const REPORT_FIELDS: &[FieldDef] = &[
    t("INPUT"),
    t("CONTROLS"),
    t("SUBCATCHMENTS"),
    t("NODES"),
    t("LINKS"),
];

const FILES_FIELDS: &[FieldDef] = &[t("Usage"), t("FileType"), t("FileName")];

const EVAPORATION_FIELDS: &[FieldDef] = &[t("Type"), t("Parameters"), t("Recovery"), t("DryOnly")];

const MAP_FIELDS: &[FieldDef] = &[
    n("LLXCoordinate"),
    n("LLYCoordinate"),
    n("URXCoordinate"),
    n("URYCoordinate"),
    t("Units"),
];

const TITLE_FIELDS: &[FieldDef] = &[t("NotesText")];

const PROFILES_FIELDS: &[FieldDef] = &[t("Profile"), t("Link")];

const NODE_JOINS: &[JoinSpec] = &[
    optional(SectionKind::Coordinates, SplitWhen::AnyFieldSet),
    optional(SectionKind::Tags, SplitWhen::FieldSet("Tag")),
    optional(SectionKind::Rdii, SplitWhen::FieldSet("UnitHydrograph")),
];

const LINK_TAG_JOIN: &[JoinSpec] = &[optional(SectionKind::Tags, SplitWhen::FieldSet("Tag"))];

const CONDUIT_JOINS: &[JoinSpec] = &[
    JoinSpec {
        secondary: SectionKind::Losses,
        required: false,
        defaults: &[
            ("EntryLoss", DefaultValue::Num(0.0)),
            ("ExitLoss", DefaultValue::Num(0.0)),
            ("AvgLoss", DefaultValue::Num(0.0)),
            ("FlapGate", DefaultValue::Text("NO")),
        ],
        split_when: SplitWhen::DiffersFromDefaults,
    },
    required(SectionKind::XSections),
    optional(SectionKind::Tags, SplitWhen::FieldSet("Tag")),
];

const XSECTION_LINK_JOINS: &[JoinSpec] = &[
    required(SectionKind::XSections),
    optional(SectionKind::Tags, SplitWhen::FieldSet("Tag")),
];

const SUBCATCHMENT_JOINS: &[JoinSpec] = &[
    required(SectionKind::Subareas),
    optional(SectionKind::Groundwater, SplitWhen::FieldSet("Aquifer")),
    required(SectionKind::Infiltration),
    optional(SectionKind::Tags, SplitWhen::FieldSet("Tag")),
];

const RAINGAGE_JOINS: &[JoinSpec] = &[
    optional(SectionKind::Symbols, SplitWhen::AnyFieldSet),
    optional(SectionKind::Tags, SplitWhen::FieldSet("Tag")),
];

/// Baseline for the registry entries: plain table, exact shape, standard
/// description handling, no joins.
const BASE: SectionSchema = SectionSchema {
    kind: SectionKind::Title,
    name: "",
    label: "",
    fields: &[],
    layout: Layout::Table,
    shape: ShapeRule::Exact,
    max_splits: None,
    group_field: None,
    identity: IdentityRule::None,
    desc_field: "Description",
    descriptions: true,
    joins: &[],
    tag_type: None,
};

macro_rules! section {
    ($($field:ident : $value:expr),* $(,)?) => {
        SectionSchema {
            $($field: $value,)*
            ..BASE
        }
    };
}

/// The registry, in canonical file order. Serialization walks this slice to
/// restore section order regardless of the order sections were read or added.
pub static SCHEMAS: &[SectionSchema] = &[
    section!(
        kind: SectionKind::Title,
        name: "Notes",
        label: "[TITLE]",
        fields: TITLE_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        identity: IdentityRule::None,
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Options,
        name: "Options",
        label: "[OPTIONS]",
        fields: OPTIONS_FIELDS,
        layout: Layout::KeyValue,
        shape: ShapeRule::Exact,
        identity: IdentityRule::None,
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Files,
        name: "Files",
        label: "[FILES]",
        fields: FILES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        max_splits: Some(2),
        identity: IdentityRule::None,
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Evaporation,
        name: "Evaporation",
        label: "[EVAPORATION]",
        fields: EVAPORATION_FIELDS,
        layout: Layout::KeyValue,
        shape: ShapeRule::Exact,
        identity: IdentityRule::None,
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Junctions,
        name: "Junctions",
        label: "[JUNCTIONS]",
        fields: JUNCTIONS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        joins: NODE_JOINS,
        tag_type: Some("Node"),
    ),
    section!(
        kind: SectionKind::Outfalls,
        name: "Outfalls",
        label: "[OUTFALLS]",
        fields: OUTFALLS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::InsertMissing(3),
        identity: IdentityRule::Field("Name"),
        joins: NODE_JOINS,
        tag_type: Some("Node"),
    ),
    section!(
        kind: SectionKind::Dividers,
        name: "Dividers",
        label: "[DIVIDERS]",
        fields: DIVIDERS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Marker(MarkerRule::Divider),
        identity: IdentityRule::Field("Name"),
        joins: NODE_JOINS,
        tag_type: Some("Node"),
    ),
    section!(
        kind: SectionKind::Storage,
        name: "Storage",
        label: "[STORAGE]",
        fields: STORAGE_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Marker(MarkerRule::Storage),
        identity: IdentityRule::Field("Name"),
        joins: NODE_JOINS,
        tag_type: Some("Node"),
    ),
    section!(
        kind: SectionKind::Coordinates,
        name: "Coordinates",
        label: "[COORDINATES]",
        fields: COORDINATES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        desc_field: "CoordinateDescription",
    ),
    section!(
        kind: SectionKind::Conduits,
        name: "Conduits",
        label: "[CONDUITS]",
        fields: CONDUITS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        joins: CONDUIT_JOINS,
        tag_type: Some("Link"),
    ),
    section!(
        kind: SectionKind::Pumps,
        name: "Pumps",
        label: "[PUMPS]",
        fields: PUMPS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        joins: LINK_TAG_JOIN,
        tag_type: Some("Link"),
    ),
    section!(
        kind: SectionKind::Orifices,
        name: "Orifices",
        label: "[ORIFICES]",
        fields: ORIFICES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        joins: XSECTION_LINK_JOINS,
        tag_type: Some("Link"),
    ),
    section!(
        kind: SectionKind::Weirs,
        name: "Weirs",
        label: "[WEIRS]",
        fields: WEIRS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(1),
        identity: IdentityRule::Field("Name"),
        joins: XSECTION_LINK_JOINS,
        tag_type: Some("Link"),
    ),
    section!(
        kind: SectionKind::Outlets,
        name: "Outlets",
        label: "[OUTLETS]",
        fields: OUTLETS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Marker(MarkerRule::Outlet),
        identity: IdentityRule::Field("Name"),
        joins: LINK_TAG_JOIN,
        tag_type: Some("Link"),
    ),
    section!(
        kind: SectionKind::XSections,
        name: "XSections",
        label: "[XSECTIONS]",
        fields: XSECTIONS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(2),
        identity: IdentityRule::Field("Name"),
        desc_field: "XSectionsDescription",
    ),
    section!(
        kind: SectionKind::Losses,
        name: "Losses",
        label: "[LOSSES]",
        fields: LOSSES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        desc_field: "LossesDescription",
    ),
    section!(
        kind: SectionKind::RainGages,
        name: "RainGages",
        label: "[RAINGAGES]",
        fields: RAINGAGES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Marker(MarkerRule::RainGage),
        identity: IdentityRule::Field("Name"),
        joins: RAINGAGE_JOINS,
        tag_type: Some("Gage"),
    ),
    section!(
        kind: SectionKind::Symbols,
        name: "Symbols",
        label: "[SYMBOLS]",
        fields: SYMBOLS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        desc_field: "CoordinateDescription",
    ),
    section!(
        kind: SectionKind::Pollutants,
        name: "Pollutants",
        label: "[POLLUTANTS]",
        fields: POLLUTANTS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
    ),
    section!(
        kind: SectionKind::LandUses,
        name: "LandUses",
        label: "[LANDUSES]",
        fields: LANDUSES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
    ),
    section!(
        kind: SectionKind::BuildUp,
        name: "BuildUp",
        label: "[BUILDUP]",
        fields: BUILDUP_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Marker(MarkerRule::BuildUp),
        identity: IdentityRule::Joined(&["LandUse", "Pollutant"]),
    ),
    section!(
        kind: SectionKind::WashOff,
        name: "WashOff",
        label: "[WASHOFF]",
        fields: WASHOFF_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Joined(&["LandUse", "Pollutant"]),
    ),
    section!(
        kind: SectionKind::Inflows,
        name: "Inflows",
        label: "[INFLOWS]",
        fields: INFLOWS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(2),
        identity: IdentityRule::Joined(&["Node", "Parameter"]),
        desc_field: "InflowsDescription",
    ),
    section!(
        kind: SectionKind::Dwf,
        name: "DWF",
        label: "[DWF]",
        fields: DWF_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(1),
        max_splits: Some(3),
        identity: IdentityRule::Joined(&["Node", "Parameter"]),
        desc_field: "DWFDescription",
    ),
    section!(
        kind: SectionKind::Rdii,
        name: "RDII",
        label: "[RDII]",
        fields: RDII_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
        desc_field: "RDIIDescription",
    ),
    section!(
        kind: SectionKind::Aquifers,
        name: "Aquifers",
        label: "[AQUIFERS]",
        fields: AQUIFERS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
    ),
    section!(
        kind: SectionKind::Subcatchments,
        name: "Subcatchments",
        label: "[SUBCATCHMENTS]",
        fields: SUBCATCHMENTS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(1),
        identity: IdentityRule::Field("Name"),
        joins: SUBCATCHMENT_JOINS,
        tag_type: Some("Subcatch"),
    ),
    section!(
        kind: SectionKind::Subareas,
        name: "Subareas",
        label: "[SUBAREAS]",
        fields: SUBAREAS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(1),
        identity: IdentityRule::Field("Name"),
        desc_field: "SubareasDescription",
    ),
    section!(
        kind: SectionKind::Infiltration,
        name: "Infiltration",
        label: "[INFILTRATION]",
        fields: INFILTRATION_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Infiltration,
        identity: IdentityRule::Field("Name"),
        desc_field: "InfiltrationDescription",
    ),
    section!(
        kind: SectionKind::Groundwater,
        name: "Groundwater",
        label: "[GROUNDWATER]",
        fields: GROUNDWATER_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::OptionalTail(1),
        identity: IdentityRule::Field("Name"),
        desc_field: "GWDescription",
    ),
    section!(
        kind: SectionKind::Coverages,
        name: "Coverages",
        label: "[COVERAGES]",
        fields: COVERAGES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Joined(&["Subcatchment", "LandUse"]),
    ),
    section!(
        kind: SectionKind::Loadings,
        name: "Loadings",
        label: "[LOADINGS]",
        fields: LOADINGS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Joined(&["Subcatchment", "Pollutant"]),
    ),
    section!(
        kind: SectionKind::Treatments,
        name: "Treatments",
        label: "[TREATMENT]",
        fields: TREATMENTS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        max_splits: Some(2),
        identity: IdentityRule::Joined(&["Node", "Pollutant"]),
    ),
    section!(
        kind: SectionKind::Vertices,
        name: "Vertices",
        label: "[VERTICES]",
        fields: VERTICES_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        group_field: Some("Link"),
        identity: IdentityRule::GroupOrdinal,
    ),
    section!(
        kind: SectionKind::Polygons,
        name: "PolygonPoints",
        label: "[POLYGONS]",
        fields: POLYGONS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        group_field: Some("Subcatchment"),
        identity: IdentityRule::GroupOrdinal,
    ),
    section!(
        kind: SectionKind::Tags,
        name: "Tags",
        label: "[TAGS]",
        fields: TAGS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Joined(&["Type", "Name"]),
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Patterns,
        name: "PatternMultipliers",
        label: "[PATTERNS]",
        fields: PATTERNS_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        group_field: Some("Pattern"),
        identity: IdentityRule::GroupOrdinal,
    ),
    section!(
        kind: SectionKind::Curves,
        name: "CurvePoints",
        label: "[CURVES]",
        fields: CURVES_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        group_field: Some("Curve"),
        identity: IdentityRule::GroupOrdinal,
    ),
    section!(
        kind: SectionKind::Hydrographs,
        name: "Hydrographs",
        label: "[HYDROGRAPHS]",
        fields: HYDROGRAPHS_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Joined(&["UHGroup", "Month", "Response"]),
    ),
    section!(
        kind: SectionKind::SnowPacks,
        name: "SnowPacks",
        label: "[SNOWPACKS]",
        fields: SNOWPACKS_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Field("Name"),
    ),
    section!(
        kind: SectionKind::TimeSeries,
        name: "TimeSeriesPoints",
        label: "[TIMESERIES]",
        fields: TIMESERIES_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        group_field: Some("TimeSeries"),
        identity: IdentityRule::GroupOrdinal,
    ),
    section!(
        kind: SectionKind::Controls,
        name: "Controls",
        label: "[CONTROLS]",
        fields: CONTROLS_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        identity: IdentityRule::None,
    ),
    section!(
        kind: SectionKind::Transects,
        name: "TransectPoints",
        label: "[TRANSECTS]",
        fields: TRANSECTS_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        group_field: Some("TransectName"),
        identity: IdentityRule::GroupOrdinal,
    ),
    section!(
        kind: SectionKind::Report,
        name: "Report",
        label: "[REPORT]",
        fields: REPORT_FIELDS,
        layout: Layout::KeyValue,
        shape: ShapeRule::Exact,
        identity: IdentityRule::None,
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Map,
        name: "Maps",
        label: "[MAP]",
        fields: MAP_FIELDS,
        layout: Layout::KeyValue,
        shape: ShapeRule::Exact,
        identity: IdentityRule::None,
        descriptions: false,
    ),
    section!(
        kind: SectionKind::Profiles,
        name: "Profiles",
        label: "[PROFILES]",
        fields: PROFILES_FIELDS,
        layout: Layout::Custom,
        shape: ShapeRule::Exact,
        group_field: Some("Profile"),
        identity: IdentityRule::GroupOrdinal,
        descriptions: false,
    ),
    // Composite pseudo-schema: never located in a file, never written as its
    // own section. `add_elements` splits it back into Inflows + DWF.
    section!(
        kind: SectionKind::NodeInflows,
        name: "NodeInflows",
        label: "NodeInflows",
        fields: NODE_INFLOWS_FIELDS,
        layout: Layout::Table,
        shape: ShapeRule::Exact,
        identity: IdentityRule::Joined(&["Node", "Parameter"]),
    ),
];

/// One composite group: independently-keyed sections folded into one entity.
#[derive(Debug, Clone, Copy)]
pub struct CompositeSpec {
    pub name: &'static str,
    pub output: SectionKind,
    pub members: &'static [SectionKind],
    pub identity: &'static [&'static str],
}

pub static COMPOSITES: &[CompositeSpec] = &[CompositeSpec {
    name: "NodeInflows",
    output: SectionKind::NodeInflows,
    members: &[SectionKind::Inflows, SectionKind::Dwf],
    identity: &["Node", "Parameter"],
}];

static BY_KIND: Lazy<HashMap<SectionKind, &'static SectionSchema>> =
    Lazy::new(|| SCHEMAS.iter().map(|s| (s.kind, s)).collect());

/// Look up a section's descriptor.
pub fn schema(kind: SectionKind) -> &'static SectionSchema {
    BY_KIND[&kind]
}

/// Uppercased significant (alphanumeric) characters of a label, capped at 5 —
/// the comparison key for section-label matching.
fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(5)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

static LABEL_KEYS: Lazy<Vec<(String, SectionKind)>> = Lazy::new(|| {
    SCHEMAS
        .iter()
        .filter(|s| s.label.starts_with('['))
        .map(|s| (label_key(s.label), s.kind))
        .collect()
});

/// Match a raw `[LABEL]` line against the registry by first-5-significant-
/// character, case-insensitive prefix. Tolerates minor spelling variants such
/// as `[TREATMENTS]` for `[TREATMENT]`; returns `None` for unknown labels.
pub fn match_label(label: &str) -> Option<SectionKind> {
    let key = label_key(label);
    if key.len() < 3 {
        return None;
    }
    LABEL_KEYS
        .iter()
        .find(|(schema_key, _)| key.starts_with(schema_key) || schema_key.starts_with(&key))
        .map(|(_, kind)| *kind)
}

/// Position of a field within a schema's field table.
pub fn field_index(schema: &SectionSchema, name: &str) -> Option<usize> {
    schema.fields.iter().position(|f| f.name == name)
}

/// Composite members must have disjoint authoritative fields besides the
/// shared identity; asserted here rather than derived (schema authors keep
/// this true when adding composite groups).
pub fn composite_members_disjoint(spec: &CompositeSpec) -> bool {
    let mut seen: Vec<&str> = Vec::new();
    for member in spec.members {
        for field in schema(*member).fields {
            if spec.identity.contains(&field.name) {
                continue;
            }
            if seen.contains(&field.name) {
                return false;
            }
            seen.push(field.name);
        }
    }
    true
}
