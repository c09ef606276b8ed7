use log::debug;
use shared::{Entity, RenderHost};
use std::collections::HashMap;

/// Render host that logs sprite lifecycle instead of drawing
#[derive(Default)]
pub struct LogRenderHost {
    sprites: HashMap<String, String>,
}

impl LogRenderHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    /// Animation currently playing on a sprite
    pub fn animation(&self, id: &str) -> Option<&str> {
        self.sprites.get(id).map(String::as_str)
    }
}

impl RenderHost for LogRenderHost {
    fn create_sprite(&mut self, entity: &Entity) {
        debug!(
            "Create {} sprite {} at ({:.0}, {:.0})",
            entity.kind, entity.id, entity.x, entity.y
        );
        self.sprites
            .insert(entity.id.clone(), entity.animation.clone());
    }

    fn destroy_sprite(&mut self, id: &str) {
        debug!("Destroy sprite {}", id);
        self.sprites.remove(id);
    }

    fn play_animation(&mut self, id: &str, animation: &str) {
        debug!("Sprite {} plays {}", id, animation);
        if let Some(current) = self.sprites.get_mut(id) {
            *current = animation.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_lifecycle() {
        let mut host = LogRenderHost::new();
        let player = Entity::player("player-1", 0.0, 0.0, 100, 10);

        host.create_sprite(&player);
        assert_eq!(host.sprite_count(), 1);
        assert_eq!(host.animation("player-1"), Some("idle"));

        host.play_animation("player-1", "walk");
        assert_eq!(host.animation("player-1"), Some("walk"));

        host.destroy_sprite("player-1");
        assert_eq!(host.sprite_count(), 0);
        host.play_animation("player-1", "idle");
        assert_eq!(host.animation("player-1"), None);
    }
}
