use anyhow::{Context, Result};
use warren_core::{Command, Event};
use warren_system_census::{Census, Survey};
use warren_world::{self as world, query, TopologyError, World, WorldConfig};

use crate::replay_token::{ReplayToken, TokenError};

/// World plus everything the driver records about the commands applied to it.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    census: Census,
    history: Vec<Command>,
    events: Vec<Event>,
}

impl Session {
    pub(crate) fn new(config: WorldConfig) -> Result<Self> {
        let world = World::with_config(config).context("failed to build the world")?;
        Ok(Self {
            world,
            census: Census::new(),
            history: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Applies `command`, recording it and folding its events into the census.
    pub(crate) fn apply(&mut self, command: Command) -> Result<(), TopologyError> {
        self.history.push(command);
        self.events.clear();
        world::apply(&mut self.world, command, &mut self.events)?;
        let world = &self.world;
        self.census.handle(&self.events, || survey(world));
        Ok(())
    }

    /// Events emitted by the most recent command.
    pub(crate) fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Direct access for entity registration, which bypasses the command log.
    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub(crate) fn census(&self) -> &Census {
        &self.census
    }

    /// Refreshes the census gauges from the current world.
    pub(crate) fn resurvey(&mut self) {
        let world = &self.world;
        self.census.resurvey(|| survey(world));
    }

    pub(crate) fn fsck(&self) -> Result<(), TopologyError> {
        self.world.fsck()
    }

    /// Token reproducing every command applied so far.
    pub(crate) fn token(&self) -> Result<String, TokenError> {
        ReplayToken::new(self.history.clone()).encode()
    }
}

pub(crate) fn survey(world: &World) -> Survey {
    let rooms = query::rooms(world);
    Survey {
        rooms: rooms.len(),
        doors: query::doors(world).len(),
        walls: query::wall_count(world),
        entities: query::entities(world).len(),
        largest_room: rooms.iter().map(|room| room.area).max().unwrap_or(0),
    }
}
