use std::collections::BTreeMap;

use crate::{settings::Settings, vec2::Vec2};

/// Index of a particle in the mesh. Particles are never destroyed, so ids
/// stay valid for the lifetime of the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(pub usize);

/// Key of a spring. Allocated from a monotone counter and never reused, so a
/// stale id can never silently point at a different spring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpringId(u64);

pub struct Particle {
    pos: Vec2,
    molten: bool,
    melting_timeout: i64,
    movable: bool,
    displacement: Vec2,
    springs: Vec<SpringId>,
}

impl Particle {
    fn new(pos: Vec2) -> Self {
        Self {
            pos,
            molten: false,
            melting_timeout: -1,
            movable: false,
            displacement: Vec2::null(),
            springs: vec![],
        }
    }

    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    pub fn radius(&self, settings: &Settings) -> f64 {
        if self.molten {
            settings.molten_particle_default_radius
        } else {
            settings.particle_default_radius
        }
    }

    pub fn molten(&self) -> bool {
        self.molten
    }

    /// Cooling a particle also clears its timeout: `molten == false` implies
    /// `melting_timeout == -1`.
    pub fn set_molten(&mut self, molten: bool) {
        self.molten = molten;
        if !molten {
            self.melting_timeout = -1;
        }
    }

    pub fn melting_timeout(&self) -> i64 {
        self.melting_timeout
    }

    pub fn set_melting_timeout(&mut self, timeout: i64) {
        self.melting_timeout = timeout;
    }

    pub fn movable(&self) -> bool {
        self.movable
    }

    pub fn set_movable(&mut self, movable: bool) {
        self.movable = movable;
    }

    pub fn set_displacement(&mut self, displacement: Vec2) {
        self.displacement = displacement;
    }

    pub fn apply_displacement(&mut self) {
        self.pos += self.displacement;
    }

    /// Ids of the incident springs, in insertion order.
    pub fn springs(&self) -> &[SpringId] {
        &self.springs
    }

    pub fn degree(&self) -> usize {
        self.springs.len()
    }
}

pub struct Spring {
    a: ParticleId,
    b: ParticleId,
    length: f64,
    force: f64,
}

impl Spring {
    pub fn endpoints(&self) -> (ParticleId, ParticleId) {
        (self.a, self.b)
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Cached scalar force: positive pushes the endpoints apart, negative
    /// pulls them together. Refreshed via [`Mesh::update_force`].
    pub fn force(&self) -> f64 {
        self.force
    }
}

/// The particle/spring graph. Particles live in a flat arena, springs in an
/// ordered map; each particle keeps the ids of its incident springs and the
/// mesh keeps both sides of that relation consistent.
#[derive(Default)]
pub struct Mesh {
    particles: Vec<Particle>,
    springs: BTreeMap<SpringId, Spring>,
    next_spring: u64,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.springs.clear();
        self.next_spring = 0;
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    pub fn add_particle(&mut self, pos: Vec2) -> ParticleId {
        self.particles.push(Particle::new(pos));
        ParticleId(self.particles.len() - 1)
    }

    pub fn particle(&self, id: ParticleId) -> &Particle {
        &self.particles[id.0]
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> &mut Particle {
        &mut self.particles[id.0]
    }

    pub fn particle_ids(&self) -> impl Iterator<Item = ParticleId> {
        (0..self.particles.len()).map(ParticleId)
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn particles_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    pub fn spring(&self, id: SpringId) -> &Spring {
        &self.springs[&id]
    }

    /// Springs in id order, which is also their creation order.
    pub fn springs(&self) -> impl Iterator<Item = (SpringId, &Spring)> {
        self.springs.iter().map(|(&id, spring)| (id, spring))
    }

    pub fn spring_ids(&self) -> impl Iterator<Item = SpringId> + '_ {
        self.springs.keys().copied()
    }

    pub fn spring_between(&self, a: ParticleId, b: ParticleId) -> Option<SpringId> {
        self.particle(a)
            .springs
            .iter()
            .copied()
            .find(|&id| self.other_end(id, a) == b)
    }

    /// Creates a spring between `a` and `b`, linking it into both incident
    /// lists. Returns `None` when the pair already carries a spring or the
    /// endpoints are invalid.
    pub fn add_spring(&mut self, a: ParticleId, b: ParticleId, length: f64) -> Option<SpringId> {
        if a == b || a.0 >= self.particles.len() || b.0 >= self.particles.len() {
            return None;
        }
        if self.spring_between(a, b).is_some() {
            return None;
        }

        let id = SpringId(self.next_spring);
        self.next_spring += 1;
        self.springs.insert(
            id,
            Spring {
                a,
                b,
                length,
                force: 0.0,
            },
        );
        self.particles[a.0].springs.push(id);
        self.particles[b.0].springs.push(id);
        Some(id)
    }

    /// Removes a spring from the mesh and from both endpoints' incident
    /// lists, returning its last state.
    pub fn detach_spring(&mut self, id: SpringId) -> Spring {
        let spring = self
            .springs
            .remove(&id)
            .expect("detached spring should exist");
        self.unlink(spring.a, id);
        self.unlink(spring.b, id);
        spring
    }

    fn unlink(&mut self, particle: ParticleId, id: SpringId) {
        let springs = &mut self.particles[particle.0].springs;
        let at = springs
            .iter()
            .position(|&s| s == id)
            .expect("spring should be linked to its endpoint");
        springs.remove(at);
    }

    pub fn other_end(&self, id: SpringId, particle: ParticleId) -> ParticleId {
        let spring = self.spring(id);
        if spring.a == particle {
            spring.b
        } else {
            spring.a
        }
    }

    /// Surface-to-surface distance between the endpoints.
    pub fn actual_length(&self, id: SpringId, settings: &Settings) -> f64 {
        let spring = self.spring(id);
        let p1 = self.particle(spring.a);
        let p2 = self.particle(spring.b);

        p1.pos.dist(p2.pos) - p1.radius(settings) - p2.radius(settings)
    }

    pub fn elongation(&self, id: SpringId, settings: &Settings) -> f64 {
        self.actual_length(id, settings) / self.spring(id).length
    }

    /// Recomputes the cached force. A compressed spring pushes back with a
    /// term singular at contact; a stretched one follows Hooke's law.
    pub fn update_force(&mut self, id: SpringId, settings: &Settings) {
        let actual = self.actual_length(id, settings);
        let spring = self
            .springs
            .get_mut(&id)
            .expect("refreshed spring should exist");

        spring.force = if actual < spring.length {
            (1.0 / actual - 1.0 / spring.length) * settings.spring_default_stiffness
                * spring.length
                * spring.length
                / 2.0
        } else {
            settings.spring_default_stiffness * (spring.length - actual)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_with_particles(positions: &[(f64, f64)]) -> Mesh {
        let mut mesh = Mesh::new();
        for &(x, y) in positions {
            mesh.add_particle(Vec2::new(x, y));
        }
        mesh
    }

    #[test]
    fn spring_links_both_endpoints() {
        let mut mesh = mesh_with_particles(&[(0.0, 0.0), (7.5, 0.0)]);
        let id = mesh
            .add_spring(ParticleId(0), ParticleId(1), 5.5)
            .expect("spring should be created");

        assert_eq!(mesh.particle(ParticleId(0)).springs(), &[id]);
        assert_eq!(mesh.particle(ParticleId(1)).springs(), &[id]);
        assert_eq!(mesh.other_end(id, ParticleId(0)), ParticleId(1));
        assert_eq!(mesh.other_end(id, ParticleId(1)), ParticleId(0));
    }

    #[test]
    fn duplicate_and_degenerate_springs_are_rejected() {
        let mut mesh = mesh_with_particles(&[(0.0, 0.0), (7.5, 0.0)]);
        mesh.add_spring(ParticleId(0), ParticleId(1), 5.5);

        assert!(mesh.add_spring(ParticleId(0), ParticleId(1), 5.5).is_none());
        assert!(mesh.add_spring(ParticleId(1), ParticleId(0), 5.5).is_none());
        assert!(mesh.add_spring(ParticleId(0), ParticleId(0), 5.5).is_none());
        assert!(mesh.add_spring(ParticleId(0), ParticleId(7), 5.5).is_none());
        assert_eq!(mesh.spring_count(), 1);
    }

    #[test]
    fn detach_unlinks_both_endpoints() {
        let mut mesh = mesh_with_particles(&[(0.0, 0.0), (7.5, 0.0), (0.0, 7.5)]);
        let ab = mesh.add_spring(ParticleId(0), ParticleId(1), 5.5).unwrap();
        let ac = mesh.add_spring(ParticleId(0), ParticleId(2), 5.5).unwrap();

        let spring = mesh.detach_spring(ab);

        assert_eq!(spring.endpoints(), (ParticleId(0), ParticleId(1)));
        assert_eq!(mesh.particle(ParticleId(0)).springs(), &[ac]);
        assert!(mesh.particle(ParticleId(1)).springs().is_empty());
        assert_eq!(mesh.spring_count(), 1);
    }

    #[test]
    fn actual_length_subtracts_radii() {
        let settings = Settings::default();
        let mut mesh = mesh_with_particles(&[(0.0, 0.0), (7.5, 0.0)]);
        let id = mesh.add_spring(ParticleId(0), ParticleId(1), 5.5).unwrap();

        assert!((mesh.actual_length(id, &settings) - 5.5).abs() < 1e-12);
        assert!((mesh.elongation(id, &settings) - 1.0).abs() < 1e-12);

        mesh.particle_mut(ParticleId(0)).set_molten(true);
        assert!((mesh.actual_length(id, &settings) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn force_is_zero_at_rest_length() {
        let settings = Settings::default();
        let mut mesh = mesh_with_particles(&[(0.0, 0.0), (7.5, 0.0)]);
        let id = mesh.add_spring(ParticleId(0), ParticleId(1), 5.5).unwrap();

        mesh.update_force(id, &settings);
        assert_eq!(mesh.spring(id).force(), 0.0);
    }

    #[test]
    fn force_sign_follows_compression() {
        let settings = Settings::default();
        let mut mesh = mesh_with_particles(&[(0.0, 0.0), (7.0, 0.0), (0.0, 8.5)]);
        let compressed = mesh.add_spring(ParticleId(0), ParticleId(1), 5.5).unwrap();
        let stretched = mesh.add_spring(ParticleId(0), ParticleId(2), 5.5).unwrap();

        mesh.update_force(compressed, &settings);
        mesh.update_force(stretched, &settings);

        assert!(mesh.spring(compressed).force() > 0.0);
        assert!((mesh.spring(stretched).force() - (-0.01)).abs() < 1e-12);
    }

    #[test]
    fn cooling_resets_the_timeout() {
        let mut mesh = mesh_with_particles(&[(0.0, 0.0)]);
        let particle = mesh.particle_mut(ParticleId(0));

        particle.set_molten(true);
        particle.set_melting_timeout(25);
        assert_eq!(particle.melting_timeout(), 25);

        particle.set_molten(false);
        assert_eq!(particle.melting_timeout(), -1);
    }
}
