mod actions;
mod render;
mod session;

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use crate::client::PackClient;
use crate::kv::KeyValueStore;

pub(crate) use self::actions::{
    move_down, move_up, refresh_inventory, selected_tier, snapshot, start_selected, status_info,
    transition_notice,
};
use self::render::draw_tui;
use self::session::PanelTerminal;

pub(crate) fn run_tui<S: KeyValueStore>(client: &mut PackClient<'_, S>) -> Result<()> {
    let mut panel = PanelTerminal::enter()?;

    let mut selected = 0;
    let mut status = if client.worker_ready() {
        refresh_inventory(client)
    } else {
        status_info("Waiting for the offline worker...")
    };

    loop {
        let before = snapshot(client);
        client.pump();
        if let Some(notice) = transition_notice(&before, client) {
            status = notice;
        }

        panel
            .terminal()
            .draw(|frame| draw_tui(frame, client, selected, &status))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Up => selected = move_up(selected),
            KeyCode::Down => selected = move_down(selected),
            KeyCode::Enter => status = start_selected(client, selected_tier(selected)),
            KeyCode::Char('r') => status = refresh_inventory(client),
            _ => {}
        }
    }

    panel.finish()
}
