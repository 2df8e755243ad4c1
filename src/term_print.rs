use anyhow::Result;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use guard_core::pdk::ModuleConfig;

use crate::{manager::WorkloadMetrics, replay::ReplaySummary};

pub struct TermPrinted;

pub trait TermPrintable {
    fn term_print(&self) -> Result<TermPrinted>;
}

impl TermPrintable for String {
    fn term_print(&self) -> Result<TermPrinted> {
        println!("{self}");
        Ok(TermPrinted)
    }
}

impl TermPrintable for Vec<WorkloadMetrics> {
    fn term_print(&self) -> Result<TermPrinted> {
        let mut firewall = table();
        firewall.set_header(header(&["WORKLOAD", "COUNTER", "VALUE"]));
        let mut syscalls = table();
        syscalls.set_header(header(&["WORKLOAD", "PID", "SYSCALLS"]));

        for metrics in self {
            if let Some(stats) = &metrics.firewall {
                for (counter, value) in stats.iter() {
                    let color = match value {
                        0 => Color::White,
                        _ if counter == l4_firewall::StatCounter::Blocked => Color::Red,
                        _ => Color::Green,
                    };
                    firewall.add_row(vec![
                        workload_cell(&metrics.workload),
                        Cell::new(counter).fg(Color::Cyan),
                        Cell::new(value).fg(color).add_attribute(Attribute::Bold),
                    ]);
                }
            }
            if let Some(counts) = &metrics.syscalls {
                for (pid, count) in counts {
                    syscalls.add_row(vec![
                        workload_cell(&metrics.workload),
                        Cell::new(pid).fg(Color::Cyan),
                        Cell::new(count),
                    ]);
                }
            }
        }

        println!("{firewall}");
        println!("{syscalls}");
        Ok(TermPrinted)
    }
}

impl TermPrintable for ReplaySummary {
    fn term_print(&self) -> Result<TermPrinted> {
        let mut table = table();
        table.set_header(header(&["EVENTS", "COUNT"]));
        for (name, value) in [
            ("packets", self.packets),
            ("forwarded", self.forwarded),
            ("dropped", self.dropped),
            ("syscalls", self.syscalls),
            ("counted syscalls", self.counted_syscalls),
            ("exits", self.exits),
            ("bad lines", self.bad_lines.len() as u64),
        ] {
            table.add_row(vec![Cell::new(name).fg(Color::Cyan), Cell::new(value)]);
        }
        println!("{table}");
        Ok(TermPrinted)
    }
}

impl TermPrintable for Vec<(String, ModuleConfig)> {
    fn term_print(&self) -> Result<TermPrinted> {
        let mut table = table();
        table.set_header(header(&["MODULE", "KEY", "VALUE"]));

        for (module, config) in self {
            let mut entries: Vec<_> = config.iter().collect();
            entries.sort();
            for (key, value) in entries {
                table.add_row(vec![
                    Cell::new(module).fg(Color::Blue).add_attribute(Attribute::Bold),
                    Cell::new(key).fg(Color::Cyan).add_attribute(Attribute::Bold),
                    Cell::new(value),
                ]);
            }
        }

        println!("{table}");
        Ok(TermPrinted)
    }
}

fn workload_cell(workload: &str) -> Cell {
    Cell::new(workload).fg(Color::Blue).add_attribute(Attribute::Bold)
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn table() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table
}
