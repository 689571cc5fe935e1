//! Arena kinematics - integration, friction, ring-out and contact geometry

/// Contact between two overlapping combatants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Angle of the axis pointing from the first combatant to the second
    pub angle: f64,
    /// Center-to-center distance
    pub distance: f64,
}

impl Contact {
    /// Unit vector along the contact axis
    pub fn axis(&self) -> (f64, f64) {
        (self.angle.cos(), self.angle.sin())
    }
}

/// Physics system for advancing combatants one tick at a time
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one tick: move by the current velocity, then decay the velocity.
    /// Returns (new_x, new_y, new_vel_x, new_vel_y)
    pub fn integrate(
        x: f64,
        y: f64,
        vel_x: f64,
        vel_y: f64,
        friction: f64,
    ) -> (f64, f64, f64, f64) {
        let new_x = x + vel_x;
        let new_y = y + vel_y;

        // Friction acts on velocity only, never on position
        (new_x, new_y, vel_x * friction, vel_y * friction)
    }

    /// Magnitude of a velocity
    pub fn speed(vel_x: f64, vel_y: f64) -> f64 {
        (vel_x * vel_x + vel_y * vel_y).sqrt()
    }

    /// Distance from the arena center
    pub fn distance_from_center(x: f64, y: f64) -> f64 {
        (x * x + y * y).sqrt()
    }

    /// Check if a position has left the arena
    pub fn is_ring_out(x: f64, y: f64, ring_out_distance: f64) -> bool {
        Self::distance_from_center(x, y) > ring_out_distance
    }

    /// Velocity for a launch along `angle` with `power` capped at `max_speed`
    pub fn launch_velocity(angle: f64, power: f64, max_speed: f64) -> (f64, f64) {
        let speed = power.min(max_speed);
        (angle.cos() * speed, angle.sin() * speed)
    }

    /// Check two equally sized combatants for overlap
    pub fn check_contact(x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> Option<Contact> {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance < radius * 2.0 {
            // atan2(0, 0) is 0, so coincident centers separate along +x
            Some(Contact {
                angle: dy.atan2(dx),
                distance,
            })
        } else {
            None
        }
    }

    /// Push an overlapping pair apart by half the overlap each.
    /// Returns ((new_x1, new_y1), (new_x2, new_y2))
    pub fn separate(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        radius: f64,
        contact: &Contact,
    ) -> ((f64, f64), (f64, f64)) {
        let (nx, ny) = contact.axis();
        let push = (radius * 2.0 - contact.distance) / 2.0;

        ((x1 - nx * push, y1 - ny * push), (x2 + nx * push, y2 + ny * push))
    }
}
