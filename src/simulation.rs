//! Simulation engine - the yearly event loop.

use crate::config::Config;
use crate::coverage::{CoverageState, Schema, COVER_TOLERANCE};
use crate::drivers::{Driver, EnvironmentalDrivers};
use crate::ecology::{
    DispersalEngine, DispersalField, MorphologyReconciler, PatchEcologyEngine, PlantingInjector, PlantingSchedule,
};
use crate::error::{ModelError, Problems, Result};
use crate::event::{Event, EventQueue, EventTime};
use crate::grid::Landscape;
use crate::io::{read_plantings, read_raster_with_table, AttributeTable, DriverSource, DriverStream};
use crate::output::{FileSnapshotSink, SnapshotSink};
use crate::species::load_species_table;
use crate::stats::{SummaryHistory, YearSummary};
use std::cell::Cell;
use std::collections::BTreeSet;

/// Data-only commands run by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    YearStart,
    ReadDrivers,
    ReadLandWater,
    UpdateDispersal,
    UpdateEcology,
    ReconcileMorphology,
    ApplyPlantings,
    WriteSnapshot,
    /// End of a simulated year; `step` stops after it.
    Pause,
}

impl Command {
    /// Priority within a year; lower runs first.
    pub fn priority(&self) -> u32 {
        match self {
            Command::YearStart => 100,
            Command::ReadDrivers => 300,
            Command::ReadLandWater => 450,
            Command::UpdateDispersal => 1000,
            Command::UpdateEcology => 1100,
            Command::ReconcileMorphology => 1200,
            Command::ApplyPlantings => 1300,
            Command::WriteSnapshot => 1500,
            Command::Pause => 2000,
        }
    }

    pub fn at(self, year: i32) -> (EventTime, Command) {
        (EventTime::new(year, self.priority()), self)
    }
}

/// Which optional phases run in which years.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    pub start_year: i32,
    pub end_year: i32,
    pub output_years: BTreeSet<i32>,
    pub morphology_years: BTreeSet<i32>,
    pub planting_years: BTreeSet<i32>,
}

impl Schedule {
    /// Queue every event of the run.
    pub fn build(&self) -> EventQueue<Command> {
        let mut queue = EventQueue::new();
        let mut add = |(time, command): (EventTime, Command)| queue.add(time, command);

        if self.output_years.contains(&self.start_year) {
            add(Command::WriteSnapshot.at(self.start_year));
        }
        for year in self.start_year + 1..=self.end_year {
            add(Command::YearStart.at(year));
            add(Command::ReadDrivers.at(year));
            add(Command::UpdateDispersal.at(year));
            add(Command::UpdateEcology.at(year));
            if self.morphology_years.contains(&year) {
                add(Command::ReadLandWater.at(year));
                add(Command::ReconcileMorphology.at(year));
            }
            if self.planting_years.contains(&year) {
                add(Command::ApplyPlantings.at(year));
            }
            if self.output_years.contains(&year) {
                add(Command::WriteSnapshot.at(year));
            }
            add(Command::Pause.at(year));
        }
        queue
    }
}

/// Map the initial coverage table onto the schema.
fn initial_cover(schema: &Schema, landscape: &Landscape, table: &AttributeTable, problems: &mut Problems) -> CoverageState {
    let mut cover = CoverageState::zeros(landscape.len(), schema.len());

    let mut mapping = Vec::with_capacity(table.columns.len());
    for name in &table.columns {
        match schema.column(name) {
            Some(column) => mapping.push(Some(column)),
            None => {
                problems.push(format!("initial conditions column {} is not in the species table", name));
                mapping.push(None);
            }
        }
    }
    for name in schema.names().filter(|n| !table.columns.iter().any(|c| c == n)) {
        log::debug!("column {} absent from initial conditions, starting at 0", name);
    }

    let mut seen = vec![false; landscape.len()];
    for (id, values) in &table.rows {
        let Some(cell) = landscape.index_of(*id) else {
            problems.push(format!("initial conditions row for cell {} which is not in the grid", id));
            continue;
        };
        if seen[cell] {
            problems.push(format!("initial conditions repeat cell {}", id));
        }
        seen[cell] = true;
        let row = cover.row_mut(cell);
        for (column, value) in mapping.iter().zip(values) {
            if let Some(column) = column {
                row[*column] = *value;
            }
        }
    }

    let missing: Vec<String> = seen
        .iter()
        .enumerate()
        .filter(|(_, s)| !**s)
        .map(|(cell, _)| landscape.cell(cell).id.to_string())
        .collect();
    if !missing.is_empty() {
        problems.push(format!(
            "{} active cell(s) have no initial conditions row (first: {})",
            missing.len(),
            missing[0]
        ));
    }

    let off = cover
        .rows()
        .filter(|r| (schema.cover_sum(r) - 1.0).abs() > COVER_TOLERANCE)
        .count();
    if off > 0 {
        log::warn!("{} cell(s) start with a cover sum outside 1 +/- {}", off, COVER_TOLERANCE);
    }
    cover
}

/// The simulation: landscape, coverage state and the yearly pipeline.
pub struct Simulation<S: SnapshotSink = FileSnapshotSink> {
    // Model
    pub schema: Schema,
    pub landscape: Landscape,
    pub cover: CoverageState,
    pub drivers: EnvironmentalDrivers,
    field: DispersalField,

    // Engines
    dispersal: DispersalEngine,
    ecology: PatchEcologyEngine,
    morphology: MorphologyReconciler,
    injector: PlantingInjector,
    plantings: PlantingSchedule,

    // Inputs and output
    streams: Vec<(Driver, DriverStream)>,
    land_water: Option<DriverStream>,
    sink: S,

    // Scheduling
    queue: EventQueue<Command>,
    start_year: i32,
    year: i32,

    // Statistics
    current: Option<YearSummary>,
    pub history: SummaryHistory,
    summary_interval: u32,
}

impl Simulation<FileSnapshotSink> {
    /// Set up a run that writes snapshots where the configuration says.
    pub fn from_config(config: &Config) -> Result<Self> {
        let sink = FileSnapshotSink::new(config.output.template.clone(), config.output.year_width);
        Self::with_sink(config, sink)
    }
}

impl<S: SnapshotSink> Simulation<S> {
    /// Set up a run, reporting every setup problem at once.
    pub fn with_sink(config: &Config, sink: S) -> Result<Self> {
        config.validate()?;
        let mut problems = Problems::new();
        let start_year = config.simulation.start_year;
        let years = config.simulated_years();
        let year_width = config.output.year_width;

        let schema = problems
            .take(load_species_table(&config.inputs.species_table))
            .and_then(|species| problems.take(Schema::new(species)));

        let mut landscape = None;
        let mut cover = None;
        if let Some((raster, table)) = problems.take(read_raster_with_table(&config.inputs.initial_conditions)) {
            landscape = problems.take(Landscape::from_raster(raster));
            match (&schema, &landscape, table) {
                (Some(schema), Some(landscape), Some(table)) => {
                    cover = Some(initial_cover(schema, landscape, &table, &mut problems));
                }
                (_, _, None) => problems.push(format!(
                    "{}: no coverage table after the grid",
                    config.inputs.initial_conditions.display()
                )),
                _ => {}
            }
        }

        let mut streams = Vec::with_capacity(Driver::ALL.len());
        let mut land_water = None;
        let morphology_years = config.morphology_years()?;
        if let Some(landscape) = &landscape {
            for driver in Driver::ALL {
                let source = DriverSource::parse(config.drivers.path(driver), year_width);
                if let Some(stream) = problems.take(DriverStream::open(driver.name(), source, &years, landscape.header())) {
                    streams.push((driver, stream));
                }
            }
            if let (Some(path), false) = (&config.drivers.land_water, morphology_years.is_empty()) {
                let source = DriverSource::parse(path, year_width);
                land_water = problems.take(DriverStream::open(
                    "land_water",
                    source,
                    &morphology_years,
                    landscape.header(),
                ));
            }
        }

        let mut plantings = PlantingSchedule::default();
        if let (Some(path), Some(schema), Some(landscape)) = (&config.inputs.plantings, &schema, &landscape) {
            if let Some(records) = problems.take(read_plantings(path)) {
                let range = start_year + 1..=config.simulation.end_year;
                plantings = problems
                    .take(PlantingSchedule::build(records, schema, landscape, range))
                    .unwrap_or_default();
            }
        }

        let (schema, landscape, cover) = match (schema, landscape, cover) {
            (Some(s), Some(l), Some(c)) if problems.is_empty() => (s, l, c),
            _ => return Err(problems.finish(()).err().unwrap_or_else(|| ModelError::Setup(Vec::new()))),
        };

        let schedule = Schedule {
            start_year,
            end_year: config.simulation.end_year,
            output_years: config.output_years()?.into_iter().collect(),
            morphology_years: morphology_years.into_iter().collect(),
            planting_years: plantings.years().collect(),
        };

        log::info!(
            "Setup complete: {} cells, {} columns, years {}..={}, {} planting(s)",
            landscape.len(),
            schema.len(),
            start_year + 1,
            config.simulation.end_year,
            plantings.len()
        );

        Ok(Self {
            dispersal: DispersalEngine::new(&landscape, &schema),
            field: DispersalField::zeros(landscape.len(), schema.len()),
            drivers: EnvironmentalDrivers::new(landscape.len()),
            ecology: PatchEcologyEngine,
            morphology: MorphologyReconciler,
            injector: PlantingInjector,
            plantings,
            streams,
            land_water,
            sink,
            queue: schedule.build(),
            start_year,
            year: start_year,
            current: None,
            history: SummaryHistory::new(),
            summary_interval: config.logging.summary_interval,
            schema,
            landscape,
            cover,
        })
    }

    /// Current year; the start year until the first step completes.
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dispersal_field(&self) -> &DispersalField {
        &self.field
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Advance one simulated year. Returns the year completed, or `None`
    /// once the schedule is exhausted.
    pub fn step(&mut self) -> Result<Option<i32>> {
        if self.queue.is_empty() {
            return Ok(None);
        }
        let paused = Cell::new(false);
        self.drain(|_| !paused.get(), |event| {
            if event.command == Command::Pause {
                paused.set(true);
            }
        })?;
        Ok(paused.get().then_some(self.year))
    }

    /// Run every remaining year. Returns the number of events executed.
    pub fn run(&mut self) -> Result<usize> {
        self.drain(|_| true, |_| {})
    }

    fn drain<P, O>(&mut self, keep_going: P, mut observe: O) -> Result<usize>
    where
        P: FnMut(&Event<Command>) -> bool,
        O: FnMut(&Event<Command>),
    {
        let mut queue = std::mem::take(&mut self.queue);
        let result = queue.run(keep_going, |event| {
            observe(&event);
            self.execute(event.time, event.command)
        });
        self.queue = queue;
        result
    }

    fn execute(&mut self, time: EventTime, command: Command) -> Result<()> {
        log::trace!("{} {:?}", time, command);
        match command {
            Command::YearStart => {
                self.year = time.year;
                log::debug!("Year {} started", self.year);
            }
            Command::ReadDrivers => {
                for (driver, stream) in &mut self.streams {
                    let raster = stream.read(time.year)?;
                    self.drivers.set(*driver, self.landscape.sample(&raster));
                }
            }
            Command::ReadLandWater => {
                if let Some(stream) = &mut self.land_water {
                    let raster = stream.read(time.year)?;
                    self.drivers.set_land_target(self.landscape.sample(&raster));
                }
            }
            Command::UpdateDispersal => {
                self.field = self.dispersal.compute(&self.cover);
            }
            Command::UpdateEcology => {
                let first_year = time.year == self.start_year + 1;
                let report = self.ecology.update(
                    &self.schema,
                    &self.landscape,
                    &mut self.cover,
                    &self.drivers,
                    &self.field,
                    first_year,
                )?;
                if report.drifted > 0 {
                    log::warn!("Year {}: {} cell(s) drifted from a cover sum of 1", time.year, report.drifted);
                }
                self.current = Some(YearSummary::collect(time.year, &self.schema, &self.cover, &report));
            }
            Command::ReconcileMorphology => {
                let report = self
                    .morphology
                    .reconcile(&self.schema, &self.landscape, &mut self.cover, &self.drivers);
                log::debug!(
                    "Year {}: land gained in {} cell(s), lost in {}, {} skipped",
                    time.year,
                    report.gained,
                    report.lost,
                    report.skipped
                );
                if let Some(summary) = &mut self.current {
                    summary.add_morphology(&report);
                }
            }
            Command::ApplyPlantings => {
                let report = self
                    .injector
                    .apply(&self.schema, &mut self.cover, self.plantings.for_year(time.year))?;
                if let Some(summary) = &mut self.current {
                    summary.add_plantings(&report);
                }
            }
            Command::WriteSnapshot => {
                self.sink
                    .write_snapshot(time.year, &self.landscape, &self.schema, &self.cover)?;
            }
            Command::Pause => {
                if let Some(summary) = self.current.take() {
                    let elapsed = (time.year - self.start_year) as u32;
                    if elapsed % self.summary_interval == 0 {
                        log::info!("{}", summary.summary());
                    }
                    self.history.record(summary);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut queue: EventQueue<Command>) -> Vec<(i32, Command)> {
        let mut out = Vec::new();
        queue
            .run(|_| true, |e| -> std::result::Result<(), ()> {
                out.push((e.time.year, e.command));
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_priorities_follow_pipeline() {
        let order = [
            Command::YearStart,
            Command::ReadDrivers,
            Command::ReadLandWater,
            Command::UpdateDispersal,
            Command::UpdateEcology,
            Command::ReconcileMorphology,
            Command::ApplyPlantings,
            Command::WriteSnapshot,
            Command::Pause,
        ];
        assert!(order.windows(2).all(|w| w[0].priority() < w[1].priority()));
    }

    #[test]
    fn test_schedule_year_pipeline() {
        let schedule = Schedule {
            start_year: 2000,
            end_year: 2002,
            output_years: [2000, 2002].into_iter().collect(),
            morphology_years: [2001].into_iter().collect(),
            planting_years: [2002].into_iter().collect(),
        };
        let events = drain(schedule.build());

        use Command::*;
        assert_eq!(
            events,
            vec![
                (2000, WriteSnapshot),
                (2001, YearStart),
                (2001, ReadDrivers),
                (2001, ReadLandWater),
                (2001, UpdateDispersal),
                (2001, UpdateEcology),
                (2001, ReconcileMorphology),
                (2001, Pause),
                (2002, YearStart),
                (2002, ReadDrivers),
                (2002, UpdateDispersal),
                (2002, UpdateEcology),
                (2002, ApplyPlantings),
                (2002, WriteSnapshot),
                (2002, Pause),
            ]
        );
    }
}
