unit! {
    system: uom::si;
    quantity: uom::si::ratio;

    @cpu: prefix!(none); "cpu", "cpu", "cpus";
    @millicpu: prefix!(milli); "mcpu", "millicpu", "millicpus";
    @microcpu: prefix!(micro); "ucpu", "microcpu", "microcpus";
    @nanocpu: prefix!(nano); "ncpu", "nanocpu", "nanocpus";
}
